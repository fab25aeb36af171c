/// Position of an identifier inside a flattened three-generation record.
///
/// Codes read left to right from the subject: `S` steps to a sire, `D` to a
/// dam. `SD` is the paternal granddam, `DSS` the dam's sire's sire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AncestorSlot {
    Subject,
    Sire,
    Dam,
    SireSire,
    SireDam,
    DamSire,
    DamDam,
    SireSireSire,
    SireSireDam,
    SireDamSire,
    SireDamDam,
    DamSireSire,
    DamSireDam,
    DamDamSire,
    DamDamDam,
}

impl AncestorSlot {
    /// All slots in record order: subject, parents, grandparents,
    /// great-grandparents.
    pub const ALL: [AncestorSlot; 15] = [
        AncestorSlot::Subject,
        AncestorSlot::Sire,
        AncestorSlot::Dam,
        AncestorSlot::SireSire,
        AncestorSlot::SireDam,
        AncestorSlot::DamSire,
        AncestorSlot::DamDam,
        AncestorSlot::SireSireSire,
        AncestorSlot::SireSireDam,
        AncestorSlot::SireDamSire,
        AncestorSlot::SireDamDam,
        AncestorSlot::DamSireSire,
        AncestorSlot::DamSireDam,
        AncestorSlot::DamDamSire,
        AncestorSlot::DamDamDam,
    ];

    /// Slots that have their own parents inside a record. Each yields one
    /// (child, sire, dam) relation.
    pub const WITH_PARENTS: [AncestorSlot; 7] = [
        AncestorSlot::Subject,
        AncestorSlot::Sire,
        AncestorSlot::Dam,
        AncestorSlot::SireSire,
        AncestorSlot::SireDam,
        AncestorSlot::DamSire,
        AncestorSlot::DamDam,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Short code of the slot (`""` for the subject itself).
    pub fn code(self) -> &'static str {
        match self {
            AncestorSlot::Subject => "",
            AncestorSlot::Sire => "S",
            AncestorSlot::Dam => "D",
            AncestorSlot::SireSire => "SS",
            AncestorSlot::SireDam => "SD",
            AncestorSlot::DamSire => "DS",
            AncestorSlot::DamDam => "DD",
            AncestorSlot::SireSireSire => "SSS",
            AncestorSlot::SireSireDam => "SSD",
            AncestorSlot::SireDamSire => "SDS",
            AncestorSlot::SireDamDam => "SDD",
            AncestorSlot::DamSireSire => "DSS",
            AncestorSlot::DamSireDam => "DSD",
            AncestorSlot::DamDamSire => "DDS",
            AncestorSlot::DamDamDam => "DDD",
        }
    }

    /// Resolve a column header to a slot.
    ///
    /// Accepts `id`/`animal`/`subject` for the subject, `sire`/`dam`, and the
    /// slot codes (`ss`, `dsd`, ...), all case-insensitive.
    pub fn from_header(header: &str) -> Option<AncestorSlot> {
        let h = header.trim().to_ascii_uppercase();
        match h.as_str() {
            "ID" | "ANIMAL" | "SUBJECT" => Some(AncestorSlot::Subject),
            "SIRE" => Some(AncestorSlot::Sire),
            "DAM" => Some(AncestorSlot::Dam),
            "" => None,
            code => AncestorSlot::ALL
                .iter()
                .copied()
                .find(|slot| slot.code() == code),
        }
    }

    /// The (sire, dam) slots of this slot, if the record reaches that deep.
    pub fn parents(self) -> Option<(AncestorSlot, AncestorSlot)> {
        use AncestorSlot::*;
        match self {
            Subject => Some((Sire, Dam)),
            Sire => Some((SireSire, SireDam)),
            Dam => Some((DamSire, DamDam)),
            SireSire => Some((SireSireSire, SireSireDam)),
            SireDam => Some((SireDamSire, SireDamDam)),
            DamSire => Some((DamSireSire, DamSireDam)),
            DamDam => Some((DamDamSire, DamDamDam)),
            _ => None,
        }
    }
}

/// One parent link derived from a record: `child` has `sire` and `dam`,
/// either of which may be unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRelation<'a> {
    pub child: &'a str,
    pub sire: Option<&'a str>,
    pub dam: Option<&'a str>,
}

/// A flattened ancestor record: one subject plus up to three generations of
/// its ancestors.
///
/// Identifiers are stored already normalized; missing-value tokens never
/// reach the record (see [`normalize_id`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorRecord {
    slots: [Option<String>; 15],
}

impl AncestorRecord {
    /// Create a record about `id`. A missing-value `id` leaves the subject
    /// slot empty, which downstream code treats as an unidentifiable record.
    pub fn new(id: &str) -> Self {
        let mut record = Self::default();
        record.set(AncestorSlot::Subject, Some(id));
        record
    }

    /// Builder-style setter.
    pub fn with(mut self, slot: AncestorSlot, id: &str) -> Self {
        self.set(slot, Some(id));
        self
    }

    /// Convenience for the common parents-only case.
    pub fn with_parents(self, sire: &str, dam: &str) -> Self {
        self.with(AncestorSlot::Sire, sire)
            .with(AncestorSlot::Dam, dam)
    }

    pub fn set(&mut self, slot: AncestorSlot, id: Option<&str>) {
        self.slots[slot.index()] = id.and_then(normalize_id);
    }

    pub fn get(&self, slot: AncestorSlot) -> Option<&str> {
        self.slots[slot.index()].as_deref()
    }

    /// The subject identifier, if the record has a usable one.
    pub fn subject(&self) -> Option<&str> {
        self.get(AncestorSlot::Subject)
    }

    /// Derive every (child, sire, dam) relation the record encodes.
    ///
    /// Relations whose child slot is missing are dropped, as are relations
    /// with neither parent known.
    pub fn relations(&self) -> Vec<ParentRelation<'_>> {
        AncestorSlot::WITH_PARENTS
            .iter()
            .filter_map(|&slot| {
                let child = self.get(slot)?;
                let (sire_slot, dam_slot) = slot.parents()?;
                let sire = self.get(sire_slot);
                let dam = self.get(dam_slot);
                if sire.is_none() && dam.is_none() {
                    return None;
                }
                Some(ParentRelation { child, sire, dam })
            })
            .collect()
    }
}

/// Tokens that mean "unknown ancestor" in upstream data. Compared
/// case-insensitively after trimming.
pub const MISSING_TOKENS: [&str; 9] = ["", "0", "na", "n/a", "null", "none", "unknown", "-", "?"];

/// Whether `s` is empty or a missing-value token.
pub fn is_missing(s: &str) -> bool {
    let trimmed = s.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Trim an identifier, returning `None` for missing values.
pub fn normalize_id(s: &str) -> Option<String> {
    if is_missing(s) {
        None
    } else {
        Some(s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(is_missing("0"));
        assert!(is_missing("NA"));
        assert!(is_missing("n/a"));
        assert!(is_missing("Unknown"));
        assert!(is_missing(" NULL "));
        assert!(!is_missing("A1"));
        assert!(!is_missing("00"));
    }

    #[test]
    fn test_normalize_keeps_case() {
        assert_eq!(normalize_id("  Rex "), Some("Rex".to_string()));
        assert_ne!(normalize_id("rex"), normalize_id("Rex"));
        assert_eq!(normalize_id("na"), None);
    }

    #[test]
    fn test_slot_headers() {
        assert_eq!(AncestorSlot::from_header("animal"), Some(AncestorSlot::Subject));
        assert_eq!(AncestorSlot::from_header("Sire"), Some(AncestorSlot::Sire));
        assert_eq!(AncestorSlot::from_header("d"), Some(AncestorSlot::Dam));
        assert_eq!(AncestorSlot::from_header("dsd"), Some(AncestorSlot::DamSireDam));
        assert_eq!(AncestorSlot::from_header("birth_date"), None);
        assert_eq!(AncestorSlot::from_header(""), None);
    }

    #[test]
    fn test_relations_three_generations() {
        let record = AncestorRecord::new("X")
            .with_parents("S", "D")
            .with(AncestorSlot::SireSire, "SS")
            .with(AncestorSlot::DamDam, "DD")
            .with(AncestorSlot::DamDamSire, "DDS");

        let relations = record.relations();
        assert_eq!(relations.len(), 4);
        assert_eq!(
            relations[0],
            ParentRelation { child: "X", sire: Some("S"), dam: Some("D") }
        );
        assert_eq!(
            relations[1],
            ParentRelation { child: "S", sire: Some("SS"), dam: None }
        );
        assert_eq!(
            relations[2],
            ParentRelation { child: "D", sire: None, dam: Some("DD") }
        );
        assert_eq!(
            relations[3],
            ParentRelation { child: "DD", sire: Some("DDS"), dam: None }
        );
    }

    #[test]
    fn test_relation_without_child_is_dropped() {
        // Paternal grandsire known but the sire itself is not.
        let record = AncestorRecord::new("X")
            .with(AncestorSlot::Dam, "D")
            .with(AncestorSlot::SireSire, "SS");

        let relations = record.relations();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].child, "X");
        assert_eq!(relations[0].sire, None);
        assert_eq!(relations[0].dam, Some("D"));
    }

    #[test]
    fn test_missing_subject() {
        let record = AncestorRecord::new("NA").with_parents("S", "D");
        assert_eq!(record.subject(), None);
        // Only the parents' (empty) relations could remain, and they carry nothing.
        assert!(record.relations().is_empty());
    }
}
