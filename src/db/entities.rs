//! Mapping between entity records and their PostgreSQL rows.
//!
//! Each [`EntityKind`] has one table named after its label, keyed by the text
//! id. Addresses and hashes are `BYTEA`, 256-bit values `NUMERIC(78, 0)`,
//! timestamps and counters `BIGINT`.

use alloy_primitives::{Address, B256, U256};
use tokio_postgres::Row;

use super::error::DbError;
use super::pool::quote_ident;
use super::types::{DbValue, Upsert};
use crate::types::entities::{
    Application, ApplicationFactory, Authority, Chain, DepositRef, EntityKind, Erc1155Deposit,
    Erc20Deposit, Erc721Deposit, Input, MultiToken, Nft, Record, RollupVersion, Token,
    TokenTransfer, ValidatorNode, ValidatorNodeProvider,
};

pub const PROGRESS_TABLE: &str = "_indexer_progress";

pub fn table(kind: EntityKind) -> &'static str {
    kind.label()
}

/// Columns in insert order. The first is always `id`.
fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Chain => &["id"],
        EntityKind::Token => &["id", "address", "chain", "name", "symbol", "decimals"],
        EntityKind::Nft | EntityKind::MultiToken => &["id", "address", "chain", "name", "symbol"],
        EntityKind::Authority => &["id", "address"],
        EntityKind::ApplicationFactory => &["id", "address", "chain"],
        EntityKind::Application => &[
            "id",
            "address",
            "owner",
            "factory",
            "chain",
            "timestamp",
            "deployment_timestamp",
            "activity_timestamp",
            "input_count",
            "rollup_version",
        ],
        EntityKind::ValidatorNodeProvider => &[
            "id",
            "address",
            "authority",
            "token",
            "payee",
            "price",
            "paused",
            "timestamp",
        ],
        EntityKind::ValidatorNode => &["id", "provider", "application", "location", "runway"],
        EntityKind::Input => &[
            "id",
            "application",
            "index",
            "msg_sender",
            "payload",
            "timestamp",
            "block_number",
            "block_hash",
            "transaction_hash",
            "chain",
            "deposit_kind",
            "deposit",
        ],
        EntityKind::Erc20Deposit => &["id", "from", "token", "amount"],
        EntityKind::Erc721Deposit => &["id", "from", "token", "token_index"],
        EntityKind::Erc1155Deposit => &["id", "from", "token", "transfers"],
    }
}

fn is_numeric(column: &str) -> bool {
    matches!(column, "price" | "runway" | "amount" | "token_index")
}

/// `SELECT` for one row by id. Numeric columns come back as text so they can
/// be parsed into `U256` without a decimal type.
pub fn select_sql(kind: EntityKind) -> String {
    let cols: Vec<String> = columns(kind)
        .iter()
        .map(|c| {
            if is_numeric(c) {
                format!("{0}::text AS {0}", quote_ident(c))
            } else {
                quote_ident(c)
            }
        })
        .collect();
    format!("SELECT {} FROM {} WHERE \"id\" = $1", cols.join(", "), table(kind))
}

fn upsert(kind: EntityKind, values: Vec<DbValue>) -> Upsert {
    Upsert {
        table: table(kind),
        columns: columns(kind).to_vec(),
        values,
        conflict_columns: vec!["id"],
    }
}

fn deposit_kind(deposit: &DepositRef) -> (&'static str, &str) {
    match deposit {
        DepositRef::Erc20(id) => ("erc20", id),
        DepositRef::Erc721(id) => ("erc721", id),
        DepositRef::Erc1155(id) => ("erc1155", id),
    }
}

pub fn to_upsert(record: &Record) -> Result<Upsert, DbError> {
    let kind = record.kind();
    let text = |s: &Option<String>| DbValue::optional(s.clone(), DbValue::Text);
    let values = match record {
        Record::Chain(c) => vec![DbValue::text(&c.id)],
        Record::Token(t) => vec![
            DbValue::text(&t.id),
            DbValue::address(t.address),
            text(&t.chain),
            text(&t.name),
            text(&t.symbol),
            DbValue::optional(t.decimals, DbValue::Int2),
        ],
        Record::Nft(Nft {
            id,
            address,
            chain,
            name,
            symbol,
        })
        | Record::MultiToken(MultiToken {
            id,
            address,
            chain,
            name,
            symbol,
        }) => vec![
            DbValue::text(id),
            DbValue::address(*address),
            text(chain),
            text(name),
            text(symbol),
        ],
        Record::Authority(a) => vec![DbValue::text(&a.id), DbValue::address(a.address)],
        Record::ApplicationFactory(f) => vec![
            DbValue::text(&f.id),
            DbValue::address(f.address),
            text(&f.chain),
        ],
        Record::Application(a) => vec![
            DbValue::text(&a.id),
            DbValue::address(a.address),
            DbValue::optional(a.owner, DbValue::address),
            text(&a.factory),
            text(&a.chain),
            DbValue::uint64(a.timestamp)?,
            DbValue::optional_uint64(a.deployment_timestamp)?,
            DbValue::optional_uint64(a.activity_timestamp)?,
            DbValue::uint64(a.input_count)?,
            DbValue::text(a.rollup_version.as_str()),
        ],
        Record::ValidatorNodeProvider(p) => vec![
            DbValue::text(&p.id),
            DbValue::address(p.address),
            DbValue::text(&p.authority),
            DbValue::text(&p.token),
            DbValue::address(p.payee),
            DbValue::numeric(p.price),
            DbValue::Bool(p.paused),
            DbValue::uint64(p.timestamp)?,
        ],
        Record::ValidatorNode(n) => vec![
            DbValue::text(&n.id),
            DbValue::text(&n.provider),
            text(&n.application),
            text(&n.location),
            DbValue::optional(n.runway, DbValue::numeric),
        ],
        Record::Input(i) => {
            let deposit = i.deposit.as_ref().map(deposit_kind);
            vec![
                DbValue::text(&i.id),
                DbValue::text(&i.application),
                DbValue::uint64(i.index)?,
                DbValue::address(i.msg_sender),
                DbValue::Bytes(i.payload.clone()),
                DbValue::uint64(i.timestamp)?,
                DbValue::uint64(i.block_number)?,
                DbValue::bytes32(i.block_hash),
                DbValue::optional(i.transaction_hash, DbValue::bytes32),
                text(&i.chain),
                DbValue::optional(deposit.map(|(k, _)| k), DbValue::text),
                DbValue::optional(deposit.map(|(_, id)| id), DbValue::text),
            ]
        }
        Record::Erc20Deposit(d) => vec![
            DbValue::text(&d.id),
            DbValue::address(d.from),
            DbValue::text(&d.token),
            DbValue::numeric(d.amount),
        ],
        Record::Erc721Deposit(d) => vec![
            DbValue::text(&d.id),
            DbValue::address(d.from),
            DbValue::text(&d.token),
            DbValue::numeric(d.token_index),
        ],
        Record::Erc1155Deposit(d) => vec![
            DbValue::text(&d.id),
            DbValue::address(d.from),
            DbValue::text(&d.token),
            DbValue::JsonB(serde_json::json!(d.transfers)),
        ],
    };
    Ok(upsert(kind, values))
}

pub fn checkpoint_upsert(chain_id: u64, block: u64) -> Result<Upsert, DbError> {
    Ok(Upsert {
        table: PROGRESS_TABLE,
        columns: vec!["chain_id", "last_block"],
        values: vec![DbValue::uint64(chain_id)?, DbValue::uint64(block)?],
        conflict_columns: vec!["chain_id"],
    })
}

/// Typed column access for one row of one table.
struct RowReader<'a> {
    row: &'a Row,
    table: &'static str,
    id: String,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a Row, table: &'static str) -> Result<Self, DbError> {
        let id = row.try_get::<_, String>("id")?;
        Ok(Self { row, table, id })
    }

    fn invalid(&self, column: &'static str, message: impl ToString) -> DbError {
        DbError::row(self.table, column, &self.id, message)
    }

    fn text(&self, column: &'static str) -> Result<String, DbError> {
        Ok(self.row.try_get(column)?)
    }

    fn opt_text(&self, column: &'static str) -> Result<Option<String>, DbError> {
        Ok(self.row.try_get(column)?)
    }

    fn opt_address(&self, column: &'static str) -> Result<Option<Address>, DbError> {
        let bytes: Option<Vec<u8>> = self.row.try_get(column)?;
        bytes
            .map(|b| {
                if b.len() != 20 {
                    return Err(self.invalid(column, format!("expected 20 bytes, got {}", b.len())));
                }
                Ok(Address::from_slice(&b))
            })
            .transpose()
    }

    fn address(&self, column: &'static str) -> Result<Address, DbError> {
        self.opt_address(column)?
            .ok_or_else(|| self.invalid(column, "unexpected NULL"))
    }

    fn opt_hash(&self, column: &'static str) -> Result<Option<B256>, DbError> {
        let bytes: Option<Vec<u8>> = self.row.try_get(column)?;
        bytes
            .map(|b| {
                if b.len() != 32 {
                    return Err(self.invalid(column, format!("expected 32 bytes, got {}", b.len())));
                }
                Ok(B256::from_slice(&b))
            })
            .transpose()
    }

    fn opt_u64(&self, column: &'static str) -> Result<Option<u64>, DbError> {
        let value: Option<i64> = self.row.try_get(column)?;
        value
            .map(|v| u64::try_from(v).map_err(|e| self.invalid(column, e)))
            .transpose()
    }

    fn u64(&self, column: &'static str) -> Result<u64, DbError> {
        self.opt_u64(column)?
            .ok_or_else(|| self.invalid(column, "unexpected NULL"))
    }

    fn opt_u256(&self, column: &'static str) -> Result<Option<U256>, DbError> {
        self.opt_text(column)?
            .map(|s| parse_numeric(&s).map_err(|e| self.invalid(column, e)))
            .transpose()
    }

    fn u256(&self, column: &'static str) -> Result<U256, DbError> {
        self.opt_u256(column)?
            .ok_or_else(|| self.invalid(column, "unexpected NULL"))
    }
}

fn parse_numeric(s: &str) -> Result<U256, String> {
    U256::from_str_radix(s, 10).map_err(|e| format!("{s:?} is not a uint256: {e}"))
}

pub fn from_row(kind: EntityKind, row: &Row) -> Result<Record, DbError> {
    let r = RowReader::new(row, table(kind))?;
    let id = r.id.clone();
    let record = match kind {
        EntityKind::Chain => Record::Chain(Chain { id }),
        EntityKind::Token => {
            let decimals: Option<i16> = row.try_get("decimals")?;
            let decimals = decimals
                .map(|d| u8::try_from(d).map_err(|e| r.invalid("decimals", e)))
                .transpose()?;
            Record::Token(Token {
                id,
                address: r.address("address")?,
                chain: r.opt_text("chain")?,
                name: r.opt_text("name")?,
                symbol: r.opt_text("symbol")?,
                decimals,
            })
        }
        EntityKind::Nft => Record::Nft(Nft {
            id,
            address: r.address("address")?,
            chain: r.opt_text("chain")?,
            name: r.opt_text("name")?,
            symbol: r.opt_text("symbol")?,
        }),
        EntityKind::MultiToken => Record::MultiToken(MultiToken {
            id,
            address: r.address("address")?,
            chain: r.opt_text("chain")?,
            name: r.opt_text("name")?,
            symbol: r.opt_text("symbol")?,
        }),
        EntityKind::Authority => Record::Authority(Authority {
            id,
            address: r.address("address")?,
        }),
        EntityKind::ApplicationFactory => Record::ApplicationFactory(ApplicationFactory {
            id,
            address: r.address("address")?,
            chain: r.opt_text("chain")?,
        }),
        EntityKind::Application => {
            let version = r.text("rollup_version")?;
            let rollup_version = RollupVersion::parse(&version)
                .ok_or_else(|| r.invalid("rollup_version", format!("unknown version {version:?}")))?;
            Record::Application(Application {
                id,
                address: r.address("address")?,
                owner: r.opt_address("owner")?,
                factory: r.opt_text("factory")?,
                chain: r.opt_text("chain")?,
                timestamp: r.u64("timestamp")?,
                deployment_timestamp: r.opt_u64("deployment_timestamp")?,
                activity_timestamp: r.opt_u64("activity_timestamp")?,
                input_count: r.u64("input_count")?,
                rollup_version,
            })
        }
        EntityKind::ValidatorNodeProvider => {
            Record::ValidatorNodeProvider(ValidatorNodeProvider {
                id,
                address: r.address("address")?,
                authority: r.text("authority")?,
                token: r.text("token")?,
                payee: r.address("payee")?,
                price: r.u256("price")?,
                paused: row.try_get("paused")?,
                timestamp: r.u64("timestamp")?,
            })
        }
        EntityKind::ValidatorNode => Record::ValidatorNode(ValidatorNode {
            id,
            provider: r.text("provider")?,
            application: r.opt_text("application")?,
            location: r.opt_text("location")?,
            runway: r.opt_u256("runway")?,
        }),
        EntityKind::Input => {
            let deposit = match (r.opt_text("deposit_kind")?, r.opt_text("deposit")?) {
                (Some(k), Some(deposit_id)) => Some(match k.as_str() {
                    "erc20" => DepositRef::Erc20(deposit_id),
                    "erc721" => DepositRef::Erc721(deposit_id),
                    "erc1155" => DepositRef::Erc1155(deposit_id),
                    other => {
                        return Err(r.invalid("deposit_kind", format!("unknown kind {other:?}")))
                    }
                }),
                _ => None,
            };
            Record::Input(Input {
                id,
                application: r.text("application")?,
                index: r.u64("index")?,
                msg_sender: r.address("msg_sender")?,
                payload: row.try_get("payload")?,
                timestamp: r.u64("timestamp")?,
                block_number: r.u64("block_number")?,
                block_hash: r
                    .opt_hash("block_hash")?
                    .ok_or_else(|| r.invalid("block_hash", "unexpected NULL"))?,
                transaction_hash: r.opt_hash("transaction_hash")?,
                chain: r.opt_text("chain")?,
                deposit,
            })
        }
        EntityKind::Erc20Deposit => Record::Erc20Deposit(Erc20Deposit {
            id,
            from: r.address("from")?,
            token: r.text("token")?,
            amount: r.u256("amount")?,
        }),
        EntityKind::Erc721Deposit => Record::Erc721Deposit(Erc721Deposit {
            id,
            from: r.address("from")?,
            token: r.text("token")?,
            token_index: r.u256("token_index")?,
        }),
        EntityKind::Erc1155Deposit => {
            let json: serde_json::Value = row.try_get("transfers")?;
            let transfers: Vec<TokenTransfer> =
                serde_json::from_value(json).map_err(|e| r.invalid("transfers", e))?;
            Record::Erc1155Deposit(Erc1155Deposit {
                id,
                from: r.address("from")?,
                token: r.text("token")?,
                transfers,
            })
        }
    };
    Ok(record)
}
