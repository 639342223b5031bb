use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tabled::Tabled;

/// One energy-production observation as the store holds it.
///
/// Every field is optional and kept as raw text: the store may hand back a
/// string, a number or null for any column, and the report must be able to
/// print "N/A" per missing cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    #[serde(rename = "departamento", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(rename = "tecnologia", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(rename = "produccion_mwh", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub production_mwh: Option<String>,
    #[serde(rename = "fecha", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "año", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(rename = "mes", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(rename = "día", default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

/// Column names used on the wire and in uploaded CSV files, in the order the
/// upload form documents them.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "departamento",
    "tecnologia",
    "produccion_mwh",
    "fecha",
    "año",
    "mes",
    "día",
];

impl ProductionRecord {
    /// Build a record from a column name and its raw cell text.
    ///
    /// Unknown columns are ignored so uploads may carry extra data.
    pub fn set_field(&mut self, column: &str, value: String) {
        let slot = match column {
            "departamento" => &mut self.department,
            "tecnologia" => &mut self.technology,
            "produccion_mwh" => &mut self.production_mwh,
            "fecha" => &mut self.date,
            "año" => &mut self.year,
            "mes" => &mut self.month,
            "día" => &mut self.day,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Pairs of (wire column, value) in `REQUIRED_COLUMNS` order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("departamento", self.department.as_deref()),
            ("tecnologia", self.technology.as_deref()),
            ("produccion_mwh", self.production_mwh.as_deref()),
            ("fecha", self.date.as_deref()),
            ("año", self.year.as_deref()),
            ("mes", self.month.as_deref()),
            ("día", self.day.as_deref()),
        ]
    }
}

// Accept a string, number, bool or null and keep its textual form.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_records: usize,
    pub total_production: f64,
    pub average_production: f64,
    pub departments: Vec<String>,
    pub technologies: Vec<String>,
    pub production_by_department: LinkedHashMap<String, f64>,
    pub production_by_technology: LinkedHashMap<String, f64>,
    /// Keyed by the raw `mes` value; names are applied at render time.
    pub production_by_month: LinkedHashMap<String, f64>,
}

/// Which grouped table a mapping feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Department,
    Technology,
    Month,
}

impl GroupKind {
    pub const ALL: [GroupKind; 3] = [GroupKind::Department, GroupKind::Technology, GroupKind::Month];

    pub fn title(self) -> &'static str {
        match self {
            GroupKind::Department => "Producción por Departamento",
            GroupKind::Technology => "Producción por Tecnología",
            GroupKind::Month => "Producción por Mes",
        }
    }

    pub fn column_label(self) -> &'static str {
        match self {
            GroupKind::Department => "Departamento",
            GroupKind::Technology => "Tecnología",
            GroupKind::Month => "Mes",
        }
    }

    pub fn mapping(self, stats: &Statistics) -> &LinkedHashMap<String, f64> {
        match self {
            GroupKind::Department => &stats.production_by_department,
            GroupKind::Technology => &stats.production_by_technology,
            GroupKind::Month => &stats.production_by_month,
        }
    }
}

/// Uniform answer of a single store write. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsertResult {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, error: Some(message.into()) }
    }
}

/// Uniform answer of one assistant turn. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResult {
    pub success: bool,
    pub file_name: String,
}

/// Tally of a bulk upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SummaryRow {
    #[tabled(rename = "Indicador")]
    pub metric: String,
    #[tabled(rename = "Valor")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupRow {
    #[tabled(rename = "Categoría")]
    pub label: String,
    #[tabled(rename = "Producción (MWh)")]
    pub production: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numbers_strings_and_nulls() {
        let json = r#"{"id": 4, "departamento": "Cesar", "tecnologia": null,
            "produccion_mwh": 12.5, "fecha": "2024-07-15", "año": 2024, "mes": "7"}"#;
        let rec: ProductionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.department.as_deref(), Some("Cesar"));
        assert_eq!(rec.technology, None);
        assert_eq!(rec.production_mwh.as_deref(), Some("12.5"));
        assert_eq!(rec.year.as_deref(), Some("2024"));
        assert_eq!(rec.month.as_deref(), Some("7"));
        assert_eq!(rec.day, None);
    }

    #[test]
    fn serializes_spanish_keys_and_skips_absent_fields() {
        let rec = ProductionRecord {
            department: Some("Guajira".into()),
            year: Some("2023".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["departamento"], "Guajira");
        assert_eq!(value["año"], "2023");
        assert!(value.get("mes").is_none());
    }

    #[test]
    fn set_field_ignores_unknown_columns() {
        let mut rec = ProductionRecord::default();
        rec.set_field("día", "3".into());
        rec.set_field("comentario", "x".into());
        assert_eq!(rec.day.as_deref(), Some("3"));
        assert_eq!(rec, ProductionRecord { day: Some("3".into()), ..Default::default() });
    }
}
