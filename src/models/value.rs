use rust_decimal::Decimal;

/// A cell as it arrives from a workbook, before typing.
///
/// The same column may carry native numbers in one export and formatted
/// text in the next; downstream code only ever branches on this enum,
/// never on runtime type inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Numeric(Decimal),
    Text(String),
    Missing,
}

impl RawValue {
    /// Missing, or text that is empty after trimming.
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Numeric(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// The value as an identifier string: product codes and order numbers
    /// sometimes arrive as numeric cells (e.g. `101.0`), which must compare
    /// equal to their text form.
    pub fn as_key(&self) -> Option<String> {
        match self {
            RawValue::Numeric(d) => Some(d.normalize().to_string()),
            RawValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() { None } else { Some(t.to_string()) }
            }
            RawValue::Missing => None,
        }
    }

    /// Raw display form, used when reporting unparseable cells.
    pub fn display(&self) -> String {
        match self {
            RawValue::Numeric(d) => d.to_string(),
            RawValue::Text(s) => s.clone(),
            RawValue::Missing => String::new(),
        }
    }
}
