use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

/// Server side prepared statement name.
///
/// Formatted as `pgexec_{tag}_{counter}`, where `tag` is random per process and
/// `counter` is monotonic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StatementName(String);

impl StatementName {
    pub(crate) fn next() -> Self {
        static TAG: OnceLock<u32> = OnceLock::new();
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let tag = *TAG.get_or_init(rand::random);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut name = format!("pgexec_{tag:08x}_");
        name.push_str(itoa::Buffer::new().format(id));
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StatementName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for StatementName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("StatementName").field(&self.as_str()).finish()
    }
}

impl AsRef<str> for StatementName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for StatementName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod test {
    use super::StatementName;

    #[test]
    fn unique_names() {
        let a = StatementName::next();
        let b = StatementName::next();
        assert_ne!(a, b);
        assert!(a.starts_with("pgexec_"));
        assert_eq!(a.split('_').nth(1), b.split('_').nth(1));
        assert!(a.len() < 64, "postgres truncate identifier longer than NAMEDATALEN");
    }
}
