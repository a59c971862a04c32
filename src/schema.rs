/// Declarative description of every form field.
///
/// Sections only group fields for display. Per-field behaviour is limited to a
/// closed set of codecs (display text ↔ stored value) and commit handlers, so
/// the whole schema stays plain data and serializes as-is.
use serde::Serialize;

use crate::case::{Case, FieldKey, RawValue, ReporterType, Witness};

// ── Kinds, codecs, handlers ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Multiline,
    Date,
    Time,
    Choice,
}

/// Built-in converters between the stored value and the editable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// String stored verbatim; absent shows as "".
    Plain,
    /// Optional boolean shown as "true" / "false" / "".
    Flag,
    /// Reporter type shown as its wire name.
    Reporter,
    /// Witness list shown as "First Last, First Last". Lossy: addresses are dropped.
    Witnesses,
}

const WITNESS_JOIN: &str = ", ";
const WITNESS_SPLIT: char = ',';

impl Codec {
    pub fn to_display(self, value: &RawValue) -> String {
        match (self, value) {
            (_, RawValue::Empty) => String::new(),
            (Codec::Witnesses, RawValue::Witnesses(list)) => list
                .iter()
                .map(|w| format!("{} {}", w.first_name, w.last_name).trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(WITNESS_JOIN),
            (_, RawValue::Text(s)) => s.clone(),
            (_, RawValue::Flag(b)) => b.to_string(),
            (_, RawValue::Reporter(r)) => r.as_str().to_string(),
            // A witness list under a non-witness codec only happens with a
            // misconfigured schema; show the names anyway.
            (_, RawValue::Witnesses(_)) => Codec::Witnesses.to_display(value),
        }
    }

    pub fn from_display(self, text: &str) -> RawValue {
        match self {
            Codec::Plain => RawValue::Text(text.to_string()),
            Codec::Flag => match text.trim() {
                "true" => RawValue::Flag(true),
                "false" => RawValue::Flag(false),
                _ => RawValue::Empty,
            },
            Codec::Reporter => ReporterType::parse(text)
                .map(RawValue::Reporter)
                .unwrap_or_default(),
            Codec::Witnesses => RawValue::Witnesses(parse_witnesses(text)),
        }
    }
}

fn parse_witnesses(text: &str) -> Vec<Witness> {
    text.split(WITNESS_SPLIT)
        .filter_map(|chunk| {
            let mut parts = chunk.split_whitespace();
            let first = parts.next().unwrap_or_default();
            let last = parts.collect::<Vec<_>>().join(" ");
            if first.is_empty() && last.is_empty() {
                None
            } else {
                Some(Witness::new(first, &last))
            }
        })
        .collect()
}

/// What happens when a field's edit is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitHandler {
    /// Parse the text with the field's codec and write that one field.
    Generic,
    /// Resolve the classification code and write code + description together.
    ClassificationLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

const YES_NO: &[ChoiceOption] = &[
    ChoiceOption { value: "true", label: "Tak" },
    ChoiceOption { value: "false", label: "Nie" },
];

const REPORTERS: &[ChoiceOption] = &[
    ChoiceOption { value: "victim", label: "Poszkodowany" },
    ChoiceOption { value: "proxy", label: "Pełnomocnik" },
];

// ── FieldDefinition ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FieldDefinition {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Full-text pattern the display text must match before it may be committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    pub codec: Codec,
    pub options: &'static [ChoiceOption],
    pub on_commit: CommitHandler,
}

impl FieldDefinition {
    fn new(key: FieldKey, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            pattern: None,
            placeholder: None,
            codec: Codec::Plain,
            options: &[],
            on_commit: CommitHandler::Generic,
        }
    }

    pub(crate) fn text(key: FieldKey, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    fn multiline(key: FieldKey, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Multiline)
    }

    fn date(key: FieldKey, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Date).pattern(DATE_PATTERN)
    }

    fn time(key: FieldKey, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Time).pattern(TIME_PATTERN)
    }

    fn yes_no(key: FieldKey, label: &'static str) -> Self {
        let mut def = Self::new(key, label, FieldKind::Choice);
        def.codec = Codec::Flag;
        def.options = YES_NO;
        def
    }

    pub(crate) fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Display text for this field's current value in `case`.
    pub fn display(&self, case: &Case) -> String {
        self.codec.to_display(&case.get(self.key))
    }

    /// Stored value for a piece of display text.
    pub fn parse(&self, text: &str) -> RawValue {
        self.codec.from_display(text)
    }

    /// Label of the choice option matching `value`, if this is a choice field.
    pub fn option_label(&self, value: &str) -> Option<&'static str> {
        self.options.iter().find(|o| o.value == value).map(|o| o.label)
    }
}

pub const PESEL_PATTERN: &str = r"\d{11}";
pub const NIP_PATTERN: &str = r"\d{10}";
pub const REGON_PATTERN: &str = r"\d{9,14}";
pub const DATE_PATTERN: &str = r"(\d{4}-\d{2}-\d{2})?";
pub const TIME_PATTERN: &str = r"(\d{2}:\d{2})?";

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub title: &'static str,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub sections: Vec<Section>,
}

impl Schema {
    /// The accident notification form.
    pub fn accident_notification() -> Self {
        use FieldKey as K;

        let mut pkd = FieldDefinition::text(K::Pkd, "Kod PKD").placeholder("np. 01.11.Z");
        pkd.on_commit = CommitHandler::ClassificationLookup;

        let mut reporter = FieldDefinition::new(K::ReporterType, "Kto zgłasza wypadek", FieldKind::Choice);
        reporter.codec = Codec::Reporter;
        reporter.options = REPORTERS;

        let mut witnesses = FieldDefinition::multiline(K::Witnesses, "Dane świadków")
            .placeholder("Imię Nazwisko, Imię Nazwisko (oddzieleni przecinkami)");
        witnesses.codec = Codec::Witnesses;

        let sections = vec![
            Section {
                title: "Dane poszkodowanego",
                fields: vec![
                    FieldDefinition::text(K::FirstName, "Imię"),
                    FieldDefinition::text(K::LastName, "Nazwisko"),
                    FieldDefinition::text(K::Pesel, "PESEL").pattern(PESEL_PATTERN),
                    FieldDefinition::date(K::DateOfBirth, "Data urodzenia"),
                    FieldDefinition::text(K::AddressHome, "Adres zamieszkania"),
                    FieldDefinition::text(K::AddressCorrespondence, "Adres do korespondencji"),
                ],
            },
            Section {
                title: "Dane płatnika składek",
                fields: vec![
                    FieldDefinition::text(K::Nip, "NIP").pattern(NIP_PATTERN),
                    FieldDefinition::text(K::Regon, "REGON").pattern(REGON_PATTERN),
                    FieldDefinition::text(K::BusinessAddress, "Adres siedziby"),
                    pkd,
                    FieldDefinition::multiline(K::BusinessDescription, "Rodzaj działalności"),
                ],
            },
            Section {
                title: "Informacje o wypadku",
                fields: vec![
                    FieldDefinition::date(K::AccidentDate, "Data wypadku"),
                    FieldDefinition::time(K::AccidentTime, "Godzina wypadku"),
                    FieldDefinition::text(K::AccidentPlace, "Miejsce wypadku"),
                    FieldDefinition::text(K::InjuryType, "Rodzaj urazu"),
                    FieldDefinition::multiline(K::AccidentDescription, "Opis zdarzenia"),
                    FieldDefinition::multiline(K::FirstAidInfo, "Udzielona pierwsza pomoc"),
                    FieldDefinition::multiline(K::ProceedingsInfo, "Postępowanie powypadkowe"),
                    FieldDefinition::multiline(K::EquipmentInfo, "Maszyny i urządzenia"),
                ],
            },
            Section {
                title: "Czas pracy",
                fields: vec![
                    FieldDefinition::time(K::PlannedWorkStart, "Planowane rozpoczęcie pracy"),
                    FieldDefinition::time(K::PlannedWorkEnd, "Planowane zakończenie pracy"),
                ],
            },
            Section {
                title: "Zgłoszenie i okoliczności",
                fields: vec![
                    reporter,
                    FieldDefinition::yes_no(K::ProxyDocumentAttached, "Załączono pełnomocnictwo"),
                    FieldDefinition::yes_no(K::Sudden, "Zdarzenie nagłe"),
                    FieldDefinition::yes_no(K::ExternalCause, "Przyczyna zewnętrzna"),
                    FieldDefinition::yes_no(K::InjuryConfirmed, "Uraz potwierdzony"),
                    FieldDefinition::yes_no(K::WorkRelated, "Związek z pracą"),
                ],
            },
            Section {
                title: "Świadkowie",
                fields: vec![witnesses],
            },
        ];

        Self { sections }
    }

    /// Every field in display order, sections flattened.
    pub fn list_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, key: FieldKey) -> Option<&FieldDefinition> {
        self.list_fields().find(|f| f.key == key)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::accident_notification()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_case_field_has_exactly_one_definition() {
        let schema = Schema::accident_notification();
        let keys: Vec<FieldKey> = schema.list_fields().map(|f| f.key).collect();
        let unique: HashSet<FieldKey> = keys.iter().copied().collect();
        assert_eq!(keys.len(), unique.len());
        assert_eq!(unique.len(), FieldKey::ALL.len());
    }

    #[test]
    fn test_only_classification_code_has_lookup_handler() {
        let schema = Schema::accident_notification();
        let lookups: Vec<FieldKey> = schema
            .list_fields()
            .filter(|f| f.on_commit == CommitHandler::ClassificationLookup)
            .map(|f| f.key)
            .collect();
        assert_eq!(lookups, vec![FieldKey::Pkd]);
    }

    #[test]
    fn test_lossless_codecs_round_trip() {
        let cases = [
            (Codec::Plain, RawValue::Text("ul. Przykładowa 1".into())),
            (Codec::Plain, RawValue::Text(String::new())),
            (Codec::Flag, RawValue::Flag(true)),
            (Codec::Flag, RawValue::Flag(false)),
            (Codec::Flag, RawValue::Empty),
            (Codec::Reporter, RawValue::Reporter(ReporterType::Victim)),
            (Codec::Reporter, RawValue::Reporter(ReporterType::Proxy)),
            (Codec::Reporter, RawValue::Empty),
        ];
        for (codec, value) in cases {
            let shown = codec.to_display(&value);
            assert_eq!(codec.from_display(&shown), value, "codec {codec:?} value {value:?}");
        }
    }

    #[test]
    fn test_plain_empty_value_shows_empty_text() {
        assert_eq!(Codec::Plain.to_display(&RawValue::Empty), "");
    }

    #[test]
    fn test_witness_display_joins_names() {
        let list = vec![Witness::new("Anna", "Nowak"), Witness::new("Jan", "Maria Kowalski")];
        assert_eq!(
            Codec::Witnesses.to_display(&RawValue::Witnesses(list)),
            "Anna Nowak, Jan Maria Kowalski"
        );
        assert_eq!(Codec::Witnesses.to_display(&RawValue::Witnesses(vec![])), "");
    }

    #[test]
    fn test_witness_round_trip_drops_address() {
        let original = vec![Witness {
            first_name: "Anna".into(),
            last_name: "Nowak".into(),
            address: Some("ul. Polna 3, Kraków".into()),
        }];
        let shown = Codec::Witnesses.to_display(&RawValue::Witnesses(original));
        assert_eq!(
            Codec::Witnesses.from_display(&shown),
            RawValue::Witnesses(vec![Witness::new("Anna", "Nowak")])
        );
    }

    #[test]
    fn test_witness_parse_discards_empty_chunks_and_extra_whitespace() {
        let parsed = Codec::Witnesses.from_display(" Anna   Nowak ,, ,Piotr,  Jan Maria Kowalski");
        assert_eq!(
            parsed,
            RawValue::Witnesses(vec![
                Witness::new("Anna", "Nowak"),
                Witness::new("Piotr", ""),
                Witness::new("Jan", "Maria Kowalski"),
            ])
        );
    }

    #[test]
    fn test_field_display_reads_case() {
        let schema = Schema::accident_notification();
        let case = Case {
            accident_date: Some("2024-05-03".into()),
            work_related: Some(true),
            ..Default::default()
        };
        let date = schema.field(FieldKey::AccidentDate).unwrap();
        let related = schema.field(FieldKey::WorkRelated).unwrap();
        assert_eq!(date.display(&case), "2024-05-03");
        assert_eq!(related.display(&case), "true");
        assert_eq!(related.option_label("true"), Some("Tak"));
    }

    #[test]
    fn test_schema_serializes() {
        let json = serde_json::to_value(Schema::accident_notification()).unwrap();
        let first = &json["sections"][0]["fields"][2];
        assert_eq!(first["key"], "pesel");
        assert_eq!(first["pattern"], r"\d{11}");
        assert_eq!(first["codec"], "plain");
        assert_eq!(json["sections"][1]["fields"][3]["on_commit"], "classification_lookup");
    }
}
