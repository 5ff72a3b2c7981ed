//! Event ABIs for both rollup generations and the validator node marketplace,
//! and classification of raw logs into [`EventKind`].

use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::B256;

use super::DecodeError;
use crate::types::config::contract::Contracts;
use crate::types::log::RawLog;

pub mod v1 {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event ApplicationCreated(
            address indexed consensus,
            address dappOwner,
            bytes32 templateHash,
            address application
        );

        #[derive(Debug, PartialEq, Eq)]
        event InputAdded(
            address indexed dapp,
            uint256 indexed inputIndex,
            address sender,
            bytes input
        );
    }
}

pub mod v2 {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event ApplicationCreated(
            address indexed consensus,
            address appOwner,
            bytes32 templateHash,
            address appContract
        );

        #[derive(Debug, PartialEq, Eq)]
        event InputAdded(address indexed appContract, uint256 indexed index, bytes input);
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

    #[derive(Debug, PartialEq, Eq)]
    event ValidatorNodeProviderCreated(
        address indexed provider,
        address indexed authority,
        address indexed token,
        address payee,
        uint256 price
    );

    #[derive(Debug, PartialEq, Eq)]
    event Paused(address account);

    #[derive(Debug, PartialEq, Eq)]
    event Unpaused(address account);

    #[derive(Debug, PartialEq, Eq)]
    event FinancialRunway(address dapp, uint256 until);

    #[derive(Debug, PartialEq, Eq)]
    event MachineLocation(address dapp, string location);
}

/// Every event the indexer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ApplicationCreatedV1,
    ApplicationCreatedV2,
    InputAddedV1,
    InputAddedV2,
    OwnershipTransferred,
    ValidatorNodeProviderCreated,
    ValidatorNodeProviderPaused,
    ValidatorNodeProviderUnpaused,
    ValidatorNodeFinancialRunway,
    ValidatorNodeMachineLocation,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ApplicationCreatedV1,
        EventKind::ApplicationCreatedV2,
        EventKind::InputAddedV1,
        EventKind::InputAddedV2,
        EventKind::OwnershipTransferred,
        EventKind::ValidatorNodeProviderCreated,
        EventKind::ValidatorNodeProviderPaused,
        EventKind::ValidatorNodeProviderUnpaused,
        EventKind::ValidatorNodeFinancialRunway,
        EventKind::ValidatorNodeMachineLocation,
    ];

    pub fn topic0(&self) -> B256 {
        match self {
            EventKind::ApplicationCreatedV1 => v1::ApplicationCreated::SIGNATURE_HASH,
            EventKind::ApplicationCreatedV2 => v2::ApplicationCreated::SIGNATURE_HASH,
            EventKind::InputAddedV1 => v1::InputAdded::SIGNATURE_HASH,
            EventKind::InputAddedV2 => v2::InputAdded::SIGNATURE_HASH,
            EventKind::OwnershipTransferred => OwnershipTransferred::SIGNATURE_HASH,
            EventKind::ValidatorNodeProviderCreated => {
                ValidatorNodeProviderCreated::SIGNATURE_HASH
            }
            EventKind::ValidatorNodeProviderPaused => Paused::SIGNATURE_HASH,
            EventKind::ValidatorNodeProviderUnpaused => Unpaused::SIGNATURE_HASH,
            EventKind::ValidatorNodeFinancialRunway => FinancialRunway::SIGNATURE_HASH,
            EventKind::ValidatorNodeMachineLocation => MachineLocation::SIGNATURE_HASH,
        }
    }

    /// Distinct topic-0 values across all kinds, for log filters.
    pub fn all_topics() -> Vec<B256> {
        let mut topics: Vec<B256> = Self::ALL.iter().map(EventKind::topic0).collect();
        topics.sort();
        topics.dedup();
        topics
    }

    /// Classify a log by its topic-0 and emitting address.
    ///
    /// Both generations share the `ApplicationCreated` signature, so the
    /// factory address decides the version. Ownership, pause and node events
    /// are emitted by arbitrary contracts and match on topic alone.
    pub fn classify(log: &RawLog, contracts: &Contracts) -> Option<EventKind> {
        let topic0 = *log.topic0()?;
        let address = &log.address;

        if topic0 == v1::ApplicationCreated::SIGNATURE_HASH {
            if contracts.is_v1_application_factory(address) {
                Some(EventKind::ApplicationCreatedV1)
            } else if contracts.is_v2_application_factory(address) {
                Some(EventKind::ApplicationCreatedV2)
            } else {
                None
            }
        } else if topic0 == v1::InputAdded::SIGNATURE_HASH {
            contracts
                .is_v1_input_box(address)
                .then_some(EventKind::InputAddedV1)
        } else if topic0 == v2::InputAdded::SIGNATURE_HASH {
            contracts
                .is_v2_input_box(address)
                .then_some(EventKind::InputAddedV2)
        } else if topic0 == OwnershipTransferred::SIGNATURE_HASH {
            Some(EventKind::OwnershipTransferred)
        } else if topic0 == ValidatorNodeProviderCreated::SIGNATURE_HASH {
            contracts
                .is_provider_factory(address)
                .then_some(EventKind::ValidatorNodeProviderCreated)
        } else if topic0 == Paused::SIGNATURE_HASH {
            Some(EventKind::ValidatorNodeProviderPaused)
        } else if topic0 == Unpaused::SIGNATURE_HASH {
            Some(EventKind::ValidatorNodeProviderUnpaused)
        } else if topic0 == FinancialRunway::SIGNATURE_HASH {
            Some(EventKind::ValidatorNodeFinancialRunway)
        } else if topic0 == MachineLocation::SIGNATURE_HASH {
            Some(EventKind::ValidatorNodeMachineLocation)
        } else {
            None
        }
    }
}

/// Decode a raw log's topics and data as event `E`.
pub fn decode_event<E: SolEvent>(log: &RawLog) -> Result<E, DecodeError> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data)
        .map_err(|e| DecodeError::abi(E::SIGNATURE, e))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};

    use super::*;
    use crate::types::config::contract::{
        MarketplaceContracts, RollupV1Contracts, RollupV2Contracts,
    };

    fn contracts() -> Contracts {
        Contracts {
            v1: Some(RollupV1Contracts {
                application_factory: Address::repeat_byte(0x11),
                input_box: Address::repeat_byte(0x12),
                erc20_portal: Address::repeat_byte(0x13),
            }),
            v2: Some(RollupV2Contracts {
                application_factories: vec![Address::repeat_byte(0x21)],
                input_box: Address::repeat_byte(0x22),
                erc20_portal: Address::repeat_byte(0x23),
                erc721_portal: Address::repeat_byte(0x24),
                erc1155_single_portal: Address::repeat_byte(0x25),
                erc1155_batch_portal: Address::repeat_byte(0x26),
            }),
            marketplace: Some(MarketplaceContracts {
                provider_factory: Address::repeat_byte(0x31),
            }),
        }
    }

    fn raw_log<E: SolEvent>(address: Address, event: &E) -> RawLog {
        let data = event.encode_log_data();
        RawLog {
            address,
            topics: data.topics().to_vec(),
            data: data.data,
            log_index: 0,
            transaction: None,
        }
    }

    #[test]
    fn test_application_created_version_follows_factory() {
        let event = v1::ApplicationCreated {
            consensus: Address::repeat_byte(1),
            dappOwner: Address::repeat_byte(2),
            templateHash: B256::repeat_byte(3),
            application: Address::repeat_byte(4),
        };
        let contracts = contracts();

        let log = raw_log(Address::repeat_byte(0x11), &event);
        assert_eq!(
            EventKind::classify(&log, &contracts),
            Some(EventKind::ApplicationCreatedV1)
        );

        let log = raw_log(Address::repeat_byte(0x21), &event);
        assert_eq!(
            EventKind::classify(&log, &contracts),
            Some(EventKind::ApplicationCreatedV2)
        );

        let log = raw_log(Address::repeat_byte(0x99), &event);
        assert_eq!(EventKind::classify(&log, &contracts), None);
    }

    #[test]
    fn test_input_added_requires_input_box() {
        let event = v1::InputAdded {
            dapp: Address::repeat_byte(4),
            inputIndex: U256::ZERO,
            sender: Address::repeat_byte(5),
            input: vec![1, 2, 3].into(),
        };
        let contracts = contracts();

        let log = raw_log(Address::repeat_byte(0x12), &event);
        assert_eq!(
            EventKind::classify(&log, &contracts),
            Some(EventKind::InputAddedV1)
        );

        // Same topic emitted by the v2 input box is not a v1 input.
        let log = raw_log(Address::repeat_byte(0x22), &event);
        assert_eq!(EventKind::classify(&log, &contracts), None);
    }

    #[test]
    fn test_topic_only_events_match_any_address() {
        let event = OwnershipTransferred {
            previousOwner: Address::repeat_byte(1),
            newOwner: Address::repeat_byte(2),
        };
        let log = raw_log(Address::repeat_byte(0x77), &event);
        assert_eq!(
            EventKind::classify(&log, &contracts()),
            Some(EventKind::OwnershipTransferred)
        );

        let event = Paused {
            account: Address::repeat_byte(1),
        };
        let log = raw_log(Address::repeat_byte(0x78), &event);
        assert_eq!(
            EventKind::classify(&log, &Contracts::default()),
            Some(EventKind::ValidatorNodeProviderPaused)
        );
    }

    #[test]
    fn test_unknown_and_empty_topics_ignored() {
        let mut log = raw_log(
            Address::repeat_byte(0x12),
            &Unpaused {
                account: Address::ZERO,
            },
        );
        log.topics = vec![B256::repeat_byte(0xee)];
        assert_eq!(EventKind::classify(&log, &contracts()), None);

        log.topics.clear();
        assert_eq!(EventKind::classify(&log, &contracts()), None);
    }

    #[test]
    fn test_all_topics_deduplicates_shared_signature() {
        let topics = EventKind::all_topics();
        assert_eq!(topics.len(), EventKind::ALL.len() - 1);
    }

    #[test]
    fn test_decode_event_round_trip() {
        let event = MachineLocation {
            dapp: Address::repeat_byte(9),
            location: "ipfs://bafy".to_string(),
        };
        let log = raw_log(Address::repeat_byte(0x40), &event);
        let decoded: MachineLocation = decode_event(&log).unwrap();
        assert_eq!(decoded, event);

        let err = decode_event::<FinancialRunway>(&log);
        assert!(err.is_err());
    }
}
