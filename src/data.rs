//! The tabular input of the regression: one housing record read from a CSV file.
//!
//! Only the first data row is used. Columns are looked up by header name, so
//! extra columns (such as `furnishingstatus`) are ignored.

use std::{fs, path::Path};

use crate::error::DataError;

pub const AREA: &str = "area";
pub const BEDROOMS: &str = "bedrooms";
pub const BATHROOMS: &str = "bathrooms";
pub const PRICE: &str = "price";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HousingRecord {
    pub area: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub price: f64,
}

impl HousingRecord {
    /// Regression inputs: area in thousands of square feet, bedrooms, bathrooms.
    pub fn features(&self) -> [f64; 3] {
        [self.area / 1000., self.bedrooms, self.bathrooms]
    }

    /// Regression target: price in millions.
    pub fn target(&self) -> f64 {
        self.price / 1_000_000.
    }
}

pub fn load_first_record(path: impl AsRef<Path>) -> Result<HousingRecord, DataError> {
    let path = path.as_ref();
    log::debug!("reading housing record from {}", path.display());
    let text = fs::read_to_string(path)?;
    parse_first_record(&text)
}

pub fn parse_first_record(text: &str) -> Result<HousingRecord, DataError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<_> = lines.next().ok_or(DataError::Empty)?.split(',').map(unquote).collect();
    let row: Vec<_> = lines.next().ok_or(DataError::Empty)?.split(',').map(unquote).collect();

    let field = |column: &str| -> Result<f64, DataError> {
        let pos = header
            .iter()
            .position(|name| *name == column)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;
        let value = row.get(pos).copied().unwrap_or_default();
        value.parse().map_err(|_| DataError::Parse {
            column: column.to_string(),
            value: value.to_string(),
        })
    };

    Ok(HousingRecord {
        area: field(AREA)?,
        bedrooms: field(BEDROOMS)?,
        bathrooms: field(BATHROOMS)?,
        price: field(PRICE)?,
    })
}

fn unquote(cell: &str) -> &str {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUSING: &str = "\
price,area,bedrooms,bathrooms,stories,mainroad,furnishingstatus
13300000,7420,4,2,3,yes,furnished
12250000,8960,4,4,4,yes,furnished
";

    #[test]
    fn first_row_by_column_name() {
        let record = parse_first_record(HOUSING).unwrap();
        assert_eq!(
            record,
            HousingRecord {
                area: 7420.,
                bedrooms: 4.,
                bathrooms: 2.,
                price: 13_300_000.,
            }
        );
        assert_eq!(record.features(), [7.42, 4., 2.]);
        assert_eq!(record.target(), 13.3);
    }

    #[test]
    fn quoted_cells() {
        let text = "\"area\",\"bedrooms\",\"bathrooms\",\"price\"\n\"1000\", 2 ,\"1\",\"500000\"\n";
        let record = parse_first_record(text).unwrap();
        assert_eq!(record.area, 1000.);
        assert_eq!(record.bedrooms, 2.);
        assert_eq!(record.target(), 0.5);
    }

    #[test]
    fn missing_column() {
        let text = "area,bedrooms,price\n1,2,3\n";
        assert!(matches!(
            parse_first_record(text),
            Err(DataError::MissingColumn(column)) if column == BATHROOMS
        ));
    }

    #[test]
    fn bad_number() {
        let text = "area,bedrooms,bathrooms,price\n1,two,3,4\n";
        assert!(matches!(
            parse_first_record(text),
            Err(DataError::Parse { column, value }) if column == BEDROOMS && value == "two"
        ));
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let text = "area,bedrooms,bathrooms,price\n1,2,3\n";
        assert!(matches!(
            parse_first_record(text),
            Err(DataError::Parse { column, .. }) if column == PRICE
        ));
    }

    #[test]
    fn header_only() {
        assert!(matches!(
            parse_first_record("area,bedrooms,bathrooms,price\n"),
            Err(DataError::Empty)
        ));
        assert!(matches!(parse_first_record(""), Err(DataError::Empty)));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join("scalargrad_data_test_housing.csv");
        fs::write(&path, HOUSING).unwrap();
        let result = load_first_record(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(result.unwrap().price, 13_300_000.);
    }

    #[test]
    fn load_missing_file() {
        let path = std::env::temp_dir().join("scalargrad_data_test_missing.csv");
        assert!(matches!(load_first_record(path), Err(DataError::Io(_))));
    }
}
