/// Token contract metadata. Each field is independently optional: a contract
/// may not implement a getter, or the call may fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}
