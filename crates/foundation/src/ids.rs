use std::fmt;

/// Stable spot identifier as the listing endpoint reports it.
///
/// The server may send numbers or strings; both are kept in their decimal/textual
/// form so `7` and `"7"` name the same spot.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpotId(String);

impl SpotId {
    /// Returns `None` for blank identifiers.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for SpotId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::SpotId;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(SpotId::new("").is_none());
        assert!(SpotId::new("   ").is_none());
    }

    #[test]
    fn numeric_and_text_forms_agree() {
        assert_eq!(SpotId::from(7), SpotId::new(" 7 ").expect("valid"));
    }
}
