/// The case record under edit, plus typed access to its fields by key.
///
/// A `Case` is mutated from two directions: wholesale by the assistant (a full
/// snapshot replaces it) and one field at a time by the user. Field-at-a-time
/// access goes through `FieldKey` + `RawValue` so that a single key can never
/// touch a sibling field.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Who files the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterType {
    Victim,
    Proxy,
}

impl ReporterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReporterType::Victim => "victim",
            ReporterType::Proxy => "proxy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "victim" => Some(ReporterType::Victim),
            "proxy" => Some(ReporterType::Proxy),
            _ => None,
        }
    }
}

// ── Witness ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Witness {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl Witness {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            address: None,
        }
    }

    /// Both name parts present after trimming.
    pub fn is_complete(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

/// Coerce any JSON shape into a witness list. Arrays keep every entry that
/// decodes as a witness object; every other shape yields an empty list.
pub fn normalize_witnesses(value: &Value) -> Vec<Witness> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| v.is_object())
            .filter_map(|v| serde_json::from_value::<Witness>(v.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_witnesses<'de, D>(deserializer: D) -> Result<Vec<Witness>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_witnesses(&value))
}

// ── Case ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Case {
    pub reporter_type: Option<ReporterType>,
    pub proxy_document_attached: Option<bool>,

    // Victim
    pub pesel: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub address_home: Option<String>,
    pub address_correspondence: Option<String>,

    // Contribution payer
    pub nip: Option<String>,
    pub regon: Option<String>,
    pub business_address: Option<String>,
    pub pkd: Option<String>,
    pub business_description: Option<String>,

    // Accident
    pub accident_date: Option<String>,
    pub accident_time: Option<String>,
    pub accident_place: Option<String>,
    pub planned_work_start: Option<String>,
    pub planned_work_end: Option<String>,
    pub injury_type: Option<String>,
    pub accident_description: Option<String>,
    pub first_aid_info: Option<String>,
    pub proceedings_info: Option<String>,
    pub equipment_info: Option<String>,

    #[serde(deserialize_with = "lenient_witnesses")]
    pub witnesses: Vec<Witness>,

    pub sudden: Option<bool>,
    pub external_cause: Option<bool>,
    pub injury_confirmed: Option<bool>,
    pub work_related: Option<bool>,
}

// ── FieldKey ──────────────────────────────────────────────────────────────────

/// Every addressable field of a `Case`. Serializes as the wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    ReporterType,
    ProxyDocumentAttached,
    Pesel,
    FirstName,
    LastName,
    DateOfBirth,
    AddressHome,
    AddressCorrespondence,
    Nip,
    Regon,
    BusinessAddress,
    Pkd,
    BusinessDescription,
    AccidentDate,
    AccidentTime,
    AccidentPlace,
    PlannedWorkStart,
    PlannedWorkEnd,
    InjuryType,
    AccidentDescription,
    FirstAidInfo,
    ProceedingsInfo,
    EquipmentInfo,
    Witnesses,
    Sudden,
    ExternalCause,
    InjuryConfirmed,
    WorkRelated,
}

impl FieldKey {
    pub const ALL: [FieldKey; 28] = [
        FieldKey::ReporterType,
        FieldKey::ProxyDocumentAttached,
        FieldKey::Pesel,
        FieldKey::FirstName,
        FieldKey::LastName,
        FieldKey::DateOfBirth,
        FieldKey::AddressHome,
        FieldKey::AddressCorrespondence,
        FieldKey::Nip,
        FieldKey::Regon,
        FieldKey::BusinessAddress,
        FieldKey::Pkd,
        FieldKey::BusinessDescription,
        FieldKey::AccidentDate,
        FieldKey::AccidentTime,
        FieldKey::AccidentPlace,
        FieldKey::PlannedWorkStart,
        FieldKey::PlannedWorkEnd,
        FieldKey::InjuryType,
        FieldKey::AccidentDescription,
        FieldKey::FirstAidInfo,
        FieldKey::ProceedingsInfo,
        FieldKey::EquipmentInfo,
        FieldKey::Witnesses,
        FieldKey::Sudden,
        FieldKey::ExternalCause,
        FieldKey::InjuryConfirmed,
        FieldKey::WorkRelated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::ReporterType => "reporter_type",
            FieldKey::ProxyDocumentAttached => "proxy_document_attached",
            FieldKey::Pesel => "pesel",
            FieldKey::FirstName => "first_name",
            FieldKey::LastName => "last_name",
            FieldKey::DateOfBirth => "date_of_birth",
            FieldKey::AddressHome => "address_home",
            FieldKey::AddressCorrespondence => "address_correspondence",
            FieldKey::Nip => "nip",
            FieldKey::Regon => "regon",
            FieldKey::BusinessAddress => "business_address",
            FieldKey::Pkd => "pkd",
            FieldKey::BusinessDescription => "business_description",
            FieldKey::AccidentDate => "accident_date",
            FieldKey::AccidentTime => "accident_time",
            FieldKey::AccidentPlace => "accident_place",
            FieldKey::PlannedWorkStart => "planned_work_start",
            FieldKey::PlannedWorkEnd => "planned_work_end",
            FieldKey::InjuryType => "injury_type",
            FieldKey::AccidentDescription => "accident_description",
            FieldKey::FirstAidInfo => "first_aid_info",
            FieldKey::ProceedingsInfo => "proceedings_info",
            FieldKey::EquipmentInfo => "equipment_info",
            FieldKey::Witnesses => "witnesses",
            FieldKey::Sudden => "sudden",
            FieldKey::ExternalCause => "external_cause",
            FieldKey::InjuryConfirmed => "injury_confirmed",
            FieldKey::WorkRelated => "work_related",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CaseError::UnknownField(s.to_string()))
    }
}

// ── RawValue ──────────────────────────────────────────────────────────────────

/// The stored (parsed) value of one field, as opposed to its display text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawValue {
    #[default]
    Empty,
    Text(String),
    Flag(bool),
    Reporter(ReporterType),
    Witnesses(Vec<Witness>),
}

impl RawValue {
    fn shape(&self) -> &'static str {
        match self {
            RawValue::Empty => "empty",
            RawValue::Text(_) => "text",
            RawValue::Flag(_) => "flag",
            RawValue::Reporter(_) => "reporter",
            RawValue::Witnesses(_) => "witnesses",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseError {
    #[error("unknown case field: {0}")]
    UnknownField(String),
    #[error("field {key} expects {expected}, got {got}")]
    TypeMismatch {
        key: FieldKey,
        expected: &'static str,
        got: &'static str,
    },
}

// ── Field access ──────────────────────────────────────────────────────────────

impl Case {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a single field.
    pub fn get(&self, key: FieldKey) -> RawValue {
        if let Some(slot) = self.text_slot(key) {
            return slot.clone().map(RawValue::Text).unwrap_or_default();
        }
        if let Some(slot) = self.flag_slot(key) {
            return slot.map(RawValue::Flag).unwrap_or_default();
        }
        match key {
            FieldKey::ReporterType => self.reporter_type.map(RawValue::Reporter).unwrap_or_default(),
            FieldKey::Witnesses => RawValue::Witnesses(self.witnesses.clone()),
            _ => RawValue::Empty,
        }
    }

    /// Write a single field. A value of the wrong shape is rejected and the
    /// case is left as it was.
    pub fn set(&mut self, key: FieldKey, value: RawValue) -> Result<(), CaseError> {
        let got = value.shape();

        if let Some(slot) = self.text_slot_mut(key) {
            return match value {
                RawValue::Text(s) => {
                    *slot = Some(s);
                    Ok(())
                }
                RawValue::Empty => {
                    *slot = None;
                    Ok(())
                }
                _ => Err(CaseError::TypeMismatch { key, expected: "text", got }),
            };
        }

        if let Some(slot) = self.flag_slot_mut(key) {
            return match value {
                RawValue::Flag(b) => {
                    *slot = Some(b);
                    Ok(())
                }
                RawValue::Empty => {
                    *slot = None;
                    Ok(())
                }
                _ => Err(CaseError::TypeMismatch { key, expected: "flag", got }),
            };
        }

        match (key, value) {
            (FieldKey::ReporterType, RawValue::Reporter(r)) => self.reporter_type = Some(r),
            (FieldKey::ReporterType, RawValue::Empty) => self.reporter_type = None,
            (FieldKey::Witnesses, RawValue::Witnesses(w)) => self.witnesses = w,
            (FieldKey::Witnesses, RawValue::Empty) => self.witnesses = Vec::new(),
            (FieldKey::ReporterType, _) => {
                return Err(CaseError::TypeMismatch { key, expected: "reporter", got });
            }
            (_, _) => {
                return Err(CaseError::TypeMismatch { key, expected: "witnesses", got });
            }
        }
        Ok(())
    }

    fn text_slot(&self, key: FieldKey) -> Option<&Option<String>> {
        Some(match key {
            FieldKey::Pesel => &self.pesel,
            FieldKey::FirstName => &self.first_name,
            FieldKey::LastName => &self.last_name,
            FieldKey::DateOfBirth => &self.date_of_birth,
            FieldKey::AddressHome => &self.address_home,
            FieldKey::AddressCorrespondence => &self.address_correspondence,
            FieldKey::Nip => &self.nip,
            FieldKey::Regon => &self.regon,
            FieldKey::BusinessAddress => &self.business_address,
            FieldKey::Pkd => &self.pkd,
            FieldKey::BusinessDescription => &self.business_description,
            FieldKey::AccidentDate => &self.accident_date,
            FieldKey::AccidentTime => &self.accident_time,
            FieldKey::AccidentPlace => &self.accident_place,
            FieldKey::PlannedWorkStart => &self.planned_work_start,
            FieldKey::PlannedWorkEnd => &self.planned_work_end,
            FieldKey::InjuryType => &self.injury_type,
            FieldKey::AccidentDescription => &self.accident_description,
            FieldKey::FirstAidInfo => &self.first_aid_info,
            FieldKey::ProceedingsInfo => &self.proceedings_info,
            FieldKey::EquipmentInfo => &self.equipment_info,
            _ => return None,
        })
    }

    fn text_slot_mut(&mut self, key: FieldKey) -> Option<&mut Option<String>> {
        Some(match key {
            FieldKey::Pesel => &mut self.pesel,
            FieldKey::FirstName => &mut self.first_name,
            FieldKey::LastName => &mut self.last_name,
            FieldKey::DateOfBirth => &mut self.date_of_birth,
            FieldKey::AddressHome => &mut self.address_home,
            FieldKey::AddressCorrespondence => &mut self.address_correspondence,
            FieldKey::Nip => &mut self.nip,
            FieldKey::Regon => &mut self.regon,
            FieldKey::BusinessAddress => &mut self.business_address,
            FieldKey::Pkd => &mut self.pkd,
            FieldKey::BusinessDescription => &mut self.business_description,
            FieldKey::AccidentDate => &mut self.accident_date,
            FieldKey::AccidentTime => &mut self.accident_time,
            FieldKey::AccidentPlace => &mut self.accident_place,
            FieldKey::PlannedWorkStart => &mut self.planned_work_start,
            FieldKey::PlannedWorkEnd => &mut self.planned_work_end,
            FieldKey::InjuryType => &mut self.injury_type,
            FieldKey::AccidentDescription => &mut self.accident_description,
            FieldKey::FirstAidInfo => &mut self.first_aid_info,
            FieldKey::ProceedingsInfo => &mut self.proceedings_info,
            FieldKey::EquipmentInfo => &mut self.equipment_info,
            _ => return None,
        })
    }

    fn flag_slot(&self, key: FieldKey) -> Option<Option<bool>> {
        match key {
            FieldKey::ProxyDocumentAttached => Some(self.proxy_document_attached),
            FieldKey::Sudden => Some(self.sudden),
            FieldKey::ExternalCause => Some(self.external_cause),
            FieldKey::InjuryConfirmed => Some(self.injury_confirmed),
            FieldKey::WorkRelated => Some(self.work_related),
            _ => None,
        }
    }

    fn flag_slot_mut(&mut self, key: FieldKey) -> Option<&mut Option<bool>> {
        match key {
            FieldKey::ProxyDocumentAttached => Some(&mut self.proxy_document_attached),
            FieldKey::Sudden => Some(&mut self.sudden),
            FieldKey::ExternalCause => Some(&mut self.external_cause),
            FieldKey::InjuryConfirmed => Some(&mut self.injury_confirmed),
            FieldKey::WorkRelated => Some(&mut self.work_related),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_key_wire_names_round_trip() {
        for key in FieldKey::ALL {
            assert_eq!(key.as_str().parse::<FieldKey>().unwrap(), key);
            let wire = serde_json::to_value(key).unwrap();
            assert_eq!(wire, json!(key.as_str()));
        }
        assert_eq!(
            "nope".parse::<FieldKey>(),
            Err(CaseError::UnknownField("nope".to_string()))
        );
    }

    #[test]
    fn test_witnesses_not_an_array_becomes_empty() {
        let case: Case = serde_json::from_value(json!({
            "first_name": "Jan",
            "witnesses": "not an array"
        }))
        .unwrap();
        assert!(case.witnesses.is_empty());
        assert_eq!(case.first_name.as_deref(), Some("Jan"));

        let case: Case = serde_json::from_value(json!({ "witnesses": null })).unwrap();
        assert!(case.witnesses.is_empty());
    }

    #[test]
    fn test_witnesses_array_drops_non_objects() {
        let case: Case = serde_json::from_value(json!({
            "witnesses": [
                { "first_name": "Anna", "last_name": "Nowak" },
                "stray",
                42
            ]
        }))
        .unwrap();
        assert_eq!(case.witnesses, vec![Witness::new("Anna", "Nowak")]);
    }

    #[test]
    fn test_unknown_keys_ignored_and_missing_keys_default() {
        let case: Case = serde_json::from_value(json!({ "shoe_size": 44 })).unwrap();
        assert_eq!(case, Case::empty());
    }

    #[test]
    fn test_set_touches_only_its_key() {
        let mut case = Case {
            first_name: Some("Jan".into()),
            sudden: Some(true),
            witnesses: vec![Witness::new("Anna", "Nowak")],
            ..Default::default()
        };
        let before = case.clone();

        case.set(FieldKey::LastName, RawValue::Text("Kowalski".into())).unwrap();

        assert_eq!(case.last_name.as_deref(), Some("Kowalski"));
        let mut expected = before;
        expected.last_name = Some("Kowalski".into());
        assert_eq!(case, expected);
    }

    #[test]
    fn test_set_rejects_wrong_shape_without_mutating() {
        let mut case = Case { sudden: Some(false), ..Default::default() };
        let err = case.set(FieldKey::Sudden, RawValue::Text("yes".into())).unwrap_err();
        assert!(matches!(err, CaseError::TypeMismatch { key: FieldKey::Sudden, .. }));
        assert_eq!(case.sudden, Some(false));

        let err = case
            .set(FieldKey::Witnesses, RawValue::Flag(true))
            .unwrap_err();
        assert!(matches!(err, CaseError::TypeMismatch { key: FieldKey::Witnesses, .. }));
    }

    #[test]
    fn test_get_and_set_every_shape() {
        let mut case = Case::empty();
        assert_eq!(case.get(FieldKey::Pesel), RawValue::Empty);
        assert_eq!(case.get(FieldKey::Witnesses), RawValue::Witnesses(vec![]));

        case.set(FieldKey::ReporterType, RawValue::Reporter(ReporterType::Proxy)).unwrap();
        case.set(FieldKey::WorkRelated, RawValue::Flag(true)).unwrap();
        case.set(FieldKey::Pesel, RawValue::Text("85010112345".into())).unwrap();

        assert_eq!(case.get(FieldKey::ReporterType), RawValue::Reporter(ReporterType::Proxy));
        assert_eq!(case.get(FieldKey::WorkRelated), RawValue::Flag(true));
        assert_eq!(case.get(FieldKey::Pesel), RawValue::Text("85010112345".into()));

        case.set(FieldKey::Pesel, RawValue::Empty).unwrap();
        assert_eq!(case.pesel, None);
    }

    #[test]
    fn test_reporter_wire_format() {
        let case: Case = serde_json::from_value(json!({ "reporter_type": "proxy" })).unwrap();
        assert_eq!(case.reporter_type, Some(ReporterType::Proxy));
        assert_eq!(ReporterType::parse(" victim "), Some(ReporterType::Victim));
        assert_eq!(ReporterType::parse("someone"), None);
    }
}
