use alloy::primitives::{Address, U256};
use std::fmt;

/// Passport URI shown when the registry lookup fails
pub const UNKNOWN_URI: &str = "unknown";

/// Registry log kinds the watcher follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EndorsementRequested,
    ApplicationSubmitted,
    AgentRegistered,
}

impl EventKind {
    /// Every kind, in the order a cycle queries them
    pub const ALL: [EventKind; 3] = [
        EventKind::EndorsementRequested,
        EventKind::ApplicationSubmitted,
        EventKind::AgentRegistered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::EndorsementRequested => "EndorsementRequested",
            EventKind::ApplicationSubmitted => "ApplicationSubmitted",
            EventKind::AgentRegistered => "AgentRegistered",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive block window scanned by one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Window for a cycle, or None when there are no new blocks.
    ///
    /// Warm start resumes right after the watermark; cold start looks back
    /// `lookback` blocks from head, clamped at genesis.
    pub fn next(last_processed: Option<u64>, head: u64, lookback: u64) -> Option<Self> {
        let from = match last_processed {
            // A watermark at u64::MAX has nothing after it
            Some(last) => last.checked_add(1)?,
            None => head.saturating_sub(lookback),
        };

        (from <= head).then_some(Self { from, to: head })
    }

    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Registry log decoded into the fields the relay needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    EndorsementRequested {
        agent_id: U256,
        agent: Address,
        endorser: Address,
    },
    ApplicationSubmitted {
        agent: Address,
        deployer: Address,
        agent_uri: String,
    },
    AgentRegistered {
        token_id: U256,
        agent: Address,
        creator: Address,
        agent_uri: String,
    },
}

/// How the passport URI for an event is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriSource<'a> {
    /// Carried on the log itself
    Inline(&'a str),
    ById(U256),
    ByAddress(Address),
}

impl RegistryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RegistryEvent::EndorsementRequested { .. } => EventKind::EndorsementRequested,
            RegistryEvent::ApplicationSubmitted { .. } => EventKind::ApplicationSubmitted,
            RegistryEvent::AgentRegistered { .. } => EventKind::AgentRegistered,
        }
    }

    /// Address that receives the notification
    pub fn recipient(&self) -> Address {
        match self {
            RegistryEvent::EndorsementRequested { endorser, .. } => *endorser,
            RegistryEvent::ApplicationSubmitted { deployer, .. } => *deployer,
            RegistryEvent::AgentRegistered { agent, .. } => *agent,
        }
    }

    pub fn uri_source(&self) -> UriSource<'_> {
        match self {
            RegistryEvent::EndorsementRequested { agent_id, .. } => UriSource::ById(*agent_id),
            RegistryEvent::ApplicationSubmitted { agent, agent_uri, .. }
            | RegistryEvent::AgentRegistered { agent, agent_uri, .. } => {
                if agent_uri.is_empty() {
                    UriSource::ByAddress(*agent)
                } else {
                    UriSource::Inline(agent_uri)
                }
            }
        }
    }

    /// Notification text; depends only on the event fields and `passport_uri`
    pub fn render(&self, passport_uri: &str) -> String {
        match self {
            RegistryEvent::EndorsementRequested { agent_id, agent, .. } => format!(
                "[Arc ID] Agent #{} ({}) has requested your endorsement.\nPassport: {}\nEndorse on-chain with endorse({}).",
                agent_id, agent, passport_uri, agent_id
            ),
            RegistryEvent::ApplicationSubmitted { agent, .. } => format!(
                "[Arc ID] Agent {} submitted an application naming you as its deployer.\nPassport: {}\nApprove on-chain with approveApplication({}).",
                agent, passport_uri, agent
            ),
            RegistryEvent::AgentRegistered {
                token_id, creator, ..
            } => format!(
                "[Arc ID] Your agent identity #{} has been registered by {}.\nPassport: {}",
                token_id, creator, passport_uri
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const AGENT: Address = address!("000000000000000000000000000000000000000a");
    const ENDORSER: Address = address!("000000000000000000000000000000000000000b");

    #[test]
    fn test_cold_start_range() {
        assert_eq!(
            BlockRange::next(None, 1000, 1000),
            Some(BlockRange { from: 0, to: 1000 })
        );
        assert_eq!(
            BlockRange::next(None, 5000, 1000),
            Some(BlockRange { from: 4000, to: 5000 })
        );
        // Young chain: clamp at genesis
        assert_eq!(
            BlockRange::next(None, 12, 1000),
            Some(BlockRange { from: 0, to: 12 })
        );
    }

    #[test]
    fn test_warm_start_range() {
        assert_eq!(
            BlockRange::next(Some(1000), 1050, 1000),
            Some(BlockRange { from: 1001, to: 1050 })
        );
        assert_eq!(
            BlockRange::next(Some(1049), 1050, 1000).map(|r| r.len()),
            Some(1)
        );
    }

    #[test]
    fn test_no_new_blocks() {
        assert_eq!(BlockRange::next(Some(1000), 1000, 1000), None);
        // Head behind the watermark (lagging RPC node)
        assert_eq!(BlockRange::next(Some(1000), 990, 1000), None);
        assert_eq!(BlockRange::next(Some(u64::MAX), u64::MAX, 1000), None);
    }

    #[test]
    fn test_watermark_at_top_of_range_stays_idle() {
        assert_eq!(
            BlockRange::next(Some(u64::MAX - 1), u64::MAX, 1000).map(|r| r.from),
            Some(u64::MAX)
        );
        assert_eq!(BlockRange::next(Some(u64::MAX), u64::MAX, 0), None);
        // Cold start at the top still clamps normally
        assert_eq!(
            BlockRange::next(None, u64::MAX, 10),
            Some(BlockRange { from: u64::MAX - 10, to: u64::MAX })
        );
    }

    #[test]
    fn test_recipients() {
        let endorsement = RegistryEvent::EndorsementRequested {
            agent_id: U256::from(7),
            agent: AGENT,
            endorser: ENDORSER,
        };
        assert_eq!(endorsement.recipient(), ENDORSER);
        assert_eq!(endorsement.uri_source(), UriSource::ById(U256::from(7)));

        let application = RegistryEvent::ApplicationSubmitted {
            agent: AGENT,
            deployer: ENDORSER,
            agent_uri: "ipfs://Qm2".into(),
        };
        assert_eq!(application.recipient(), ENDORSER);
        assert_eq!(application.uri_source(), UriSource::Inline("ipfs://Qm2"));

        let registered = RegistryEvent::AgentRegistered {
            token_id: U256::from(3),
            agent: AGENT,
            creator: ENDORSER,
            agent_uri: String::new(),
        };
        assert_eq!(registered.recipient(), AGENT);
        assert_eq!(registered.uri_source(), UriSource::ByAddress(AGENT));
    }

    #[test]
    fn test_render_is_stable() {
        let event = RegistryEvent::EndorsementRequested {
            agent_id: U256::from(7),
            agent: AGENT,
            endorser: ENDORSER,
        };
        let first = event.render("ipfs://Qm1");
        let second = event.clone().render("ipfs://Qm1");
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert!(first.contains("#7"));
        assert!(first.contains("ipfs://Qm1"));
        assert_ne!(first, event.render(UNKNOWN_URI));
    }

    #[test]
    fn test_render_registration() {
        let event = RegistryEvent::AgentRegistered {
            token_id: U256::from(42),
            agent: AGENT,
            creator: ENDORSER,
            agent_uri: "ipfs://Qm3".into(),
        };
        let text = event.render("ipfs://Qm3");
        assert!(text.contains("#42"));
        assert!(text.contains(&ENDORSER.to_string()));
    }
}
