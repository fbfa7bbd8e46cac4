use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// One execution context. Background is a process-wide singleton; Content and
/// Panel exist per tab and come and go with page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Background,
    Content(TabId),
    Panel(TabId),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Background => f.write_str("background"),
            Address::Content(tab) => write!(f, "content({tab})"),
            Address::Panel(tab) => write!(f, "panel({tab})"),
        }
    }
}

/// Background reaches every tab's Content and back; a Panel talks only to the
/// Content of its own tab.
pub fn can_route(from: Address, to: Address) -> bool {
    match (from, to) {
        (Address::Background, Address::Content(_)) | (Address::Content(_), Address::Background) => {
            true
        }
        (Address::Content(a), Address::Panel(b)) | (Address::Panel(a), Address::Content(b)) => {
            a == b
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology() {
        let t1 = TabId(1);
        let t2 = TabId(2);
        assert!(can_route(Address::Background, Address::Content(t1)));
        assert!(can_route(Address::Content(t2), Address::Background));
        assert!(can_route(Address::Panel(t1), Address::Content(t1)));
        assert!(can_route(Address::Content(t1), Address::Panel(t1)));

        assert!(!can_route(Address::Panel(t1), Address::Background));
        assert!(!can_route(Address::Background, Address::Panel(t1)));
        assert!(!can_route(Address::Panel(t1), Address::Content(t2)));
        assert!(!can_route(Address::Content(t1), Address::Content(t1)));
    }
}
