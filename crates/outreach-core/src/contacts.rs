use serde::{Deserialize, Serialize};

/// An addressable recipient. `address` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub address: String,
    pub display_name: String,
}

impl Contact {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}

/// One imported row: the contact plus an optional per-row message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow {
    pub contact: Contact,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Delimited-text import
// ---------------------------------------------------------------------------

struct Columns {
    address: usize,
    name: Option<usize>,
    message: Option<usize>,
}

impl Columns {
    /// Detect a header row. A row naming a `phone` or `address` column is a header.
    fn from_header(row: &[String]) -> Option<Self> {
        let find = |names: &[&str]| {
            row.iter()
                .position(|c| names.iter().any(|n| c.eq_ignore_ascii_case(n)))
        };
        let address = find(&["phone", "address"])?;
        Some(Self {
            address,
            name: find(&["name", "display_name"]),
            message: find(&["message"]),
        })
    }

    fn positional() -> Self {
        Self {
            address: 0,
            name: Some(1),
            message: None,
        }
    }
}

/// Parse comma-delimited contact rows.
///
/// A first row with a `phone` or `address` column is read as a header and the
/// remaining rows are read by column name; otherwise every row is positional
/// (`address[,name]`). Rows without an address are skipped.
pub fn parse_contacts(text: &str) -> Vec<ContactRow> {
    let mut rows = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(split_row)
        .peekable();

    let columns = match rows.peek().and_then(|first| Columns::from_header(first)) {
        Some(cols) => {
            rows.next();
            cols
        }
        None => Columns::positional(),
    };

    let field = |row: &[String], idx: Option<usize>| {
        idx.and_then(|i| row.get(i))
            .filter(|v| !v.is_empty())
            .cloned()
    };

    rows.filter_map(|row| {
        let address = field(&row, Some(columns.address))?;
        let display_name = field(&row, columns.name).unwrap_or_else(|| address.clone());
        Some(ContactRow {
            contact: Contact::new(address, display_name),
            message: field(&row, columns.message),
        })
    })
    .collect()
}

/// Split one line on commas, honouring double quotes and `""` escapes.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
