use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading and validating the sales table.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("input file '{}' not found", path.display())]
    InputMissing { path: PathBuf },
    #[error("required column '{column}' not found")]
    MissingColumn { column: String },
    #[error("failed to parse '{value}' as number in column '{column}' at row {row}")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("table has no records")]
    Empty,
    #[error("invalid JSON input: {0}")]
    Json(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Categorical column used as a grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Continent,
    Brand,
    SalesChannel,
}

impl Dimension {
    pub fn column(self) -> &'static str {
        match self {
            Dimension::Continent => "Continent",
            Dimension::Brand => "Brand",
            Dimension::SalesChannel => "Sales_Channel",
        }
    }

    pub fn of(self, record: &Record) -> &str {
        match self {
            Dimension::Continent => &record.continent,
            Dimension::Brand => &record.brand,
            Dimension::SalesChannel => &record.sales_channel,
        }
    }
}

/// Numeric column used as an aggregation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    UnitsSold,
    UnitPrice,
    Revenue,
    Discount,
}

impl Measure {
    pub fn column(self) -> &'static str {
        match self {
            Measure::UnitsSold => "Units_Sold",
            Measure::UnitPrice => "Unit_Price",
            Measure::Revenue => "Revenue",
            Measure::Discount => "Discount",
        }
    }

    pub fn of(self, record: &Record) -> f64 {
        match self {
            Measure::UnitsSold => record.units_sold as f64,
            Measure::UnitPrice => record.unit_price,
            Measure::Revenue => record.revenue,
            Measure::Discount => record.discount,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One car sales row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub continent: String,
    pub brand: String,
    pub sales_channel: String,
    pub units_sold: u64,
    pub unit_price: f64,
    pub revenue: f64,
    /// Unit is not known (percentage or amount); kept as the raw number.
    pub discount: f64,
}

/// The loaded dataset. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Table {
    records: Vec<Record>,
}

const REQUIRED_COLUMNS: [&str; 7] = [
    "Continent",
    "Brand",
    "Sales_Channel",
    "Units_Sold",
    "Unit_Price",
    "Revenue",
    "Discount",
];

impl Table {
    pub fn new(records: Vec<Record>) -> Result<Self, DataError> {
        if records.is_empty() {
            return Err(DataError::Empty);
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load from a file, choosing JSON for `.json` paths and CSV otherwise
    pub fn load(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Err(DataError::InputMissing {
                path: path.to_path_buf(),
            });
        }

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let mut text = String::new();
            File::open(path)?.read_to_string(&mut text)?;
            let value: Value =
                serde_json::from_str(&text).map_err(|e| DataError::Json(e.to_string()))?;
            Self::from_json(&value)
        } else {
            Self::from_csv_reader(File::open(path)?)
        }
    }

    /// Parse a CSV stream with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        Self::from_rows(&headers, &rows)
    }

    /// Create a table from a JSON array of objects keyed by column name
    pub fn from_json(value: &Value) -> Result<Self, DataError> {
        let array = value
            .as_array()
            .ok_or_else(|| DataError::Json("input must be an array of objects".to_string()))?;

        if array.is_empty() {
            return Err(DataError::Empty);
        }

        let headers: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| DataError::Json("items in array must be objects".to_string()))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) => String::new(),
                    None => {
                        return Err(DataError::MissingColumn {
                            column: header.clone(),
                        })
                    }
                    Some(_) => {
                        return Err(DataError::Json(format!(
                            "unsupported value type for field '{}'",
                            header
                        )))
                    }
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Self::from_rows(&headers, &rows)
    }

    /// Validate string cells against the required schema
    pub fn from_rows(headers: &[String], rows: &[Vec<String>]) -> Result<Self, DataError> {
        let idx = |name: &str| -> Result<usize, DataError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataError::MissingColumn {
                    column: name.to_string(),
                })
        };

        let continent = idx("Continent")?;
        let brand = idx("Brand")?;
        let channel = idx("Sales_Channel")?;
        let units = idx("Units_Sold")?;
        let price = idx("Unit_Price")?;
        let revenue = idx("Revenue")?;
        let discount = idx("Discount")?;

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row_num = i + 1;
            let cell = |col: usize| row.get(col).map(String::as_str).unwrap_or("");

            records.push(Record {
                continent: cell(continent).to_string(),
                brand: cell(brand).to_string(),
                sales_channel: cell(channel).to_string(),
                units_sold: parse_count(cell(units), "Units_Sold", row_num)?,
                unit_price: parse_number(cell(price), "Unit_Price", row_num)?,
                revenue: parse_number(cell(revenue), "Revenue", row_num)?,
                discount: parse_number(cell(discount), "Discount", row_num)?,
            });
        }

        Self::new(records)
    }
}

/// Finite real number. `NaN` and infinities are rejected.
fn parse_number(value: &str, column: &str, row: usize) -> Result<f64, DataError> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(DataError::NotNumeric {
            column: column.to_string(),
            row,
            value: value.to_string(),
        }),
    }
}

/// Non-negative whole number, written either as `10` or `10.0`
fn parse_count(value: &str, column: &str, row: usize) -> Result<u64, DataError> {
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    match parse_number(value, column, row)? {
        n if n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => Ok(n as u64),
        _ => Err(DataError::NotNumeric {
            column: column.to_string(),
            row,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(
        continent: &str,
        brand: &str,
        channel: &str,
        units: u64,
        price: f64,
        revenue: f64,
        discount: f64,
    ) -> Record {
        Record {
            continent: continent.to_string(),
            brand: brand.to_string(),
            sales_channel: channel.to_string(),
            units_sold: units,
            unit_price: price,
            revenue,
            discount,
        }
    }

    /// The four-row fixture used across module tests
    pub(crate) fn fixture() -> Table {
        Table::new(vec![
            record("Asia", "Toyota", "Online", 10, 20000.0, 200000.0, 5.0),
            record("Asia", "Toyota", "Dealer", 5, 20000.0, 100000.0, 2.0),
            record("Europe", "BMW", "Online", 8, 40000.0, 320000.0, 10.0),
            record("Europe", "BMW", "Dealer", 2, 40000.0, 80000.0, 0.0),
        ])
        .unwrap()
    }

    const CSV: &str = "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n\
                       Asia,Toyota,Online,10,20000,200000,5\n\
                       Europe,BMW,Dealer,2,40000,80000,0\n";

    #[test]
    fn test_from_csv_reader_basic() {
        let table = Table::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].continent, "Asia");
        assert_eq!(table.records()[1].units_sold, 2);
        assert_eq!(table.records()[1].revenue, 80000.0);
    }

    #[test]
    fn test_from_csv_reader_extra_columns_and_order() {
        let csv = "Revenue,Id,Discount,Brand,Continent,Sales_Channel,Unit_Price,Units_Sold\n\
                   100,7,1.5,Kia,Asia,Online,50,2\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        let r = &table.records()[0];
        assert_eq!(r.brand, "Kia");
        assert_eq!(r.discount, 1.5);
        assert_eq!(r.units_sold, 2);
    }

    #[test]
    fn test_from_csv_reader_missing_column() {
        let csv = "Continent,Brand,Units_Sold,Unit_Price,Revenue,Discount\nAsia,Kia,1,2,3,4\n";
        let err = Table::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column } if column == "Sales_Channel"));
    }

    #[test]
    fn test_from_csv_reader_non_numeric() {
        let csv = "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n\
                   Asia,Kia,Online,1,2,lots,4\n";
        let err = Table::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
        match err {
            DataError::NotNumeric { column, row, value } => {
                assert_eq!(column, "Revenue");
                assert_eq!(row, 1);
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_csv_reader_rejects_non_finite() {
        for bad in ["NaN", "inf", "-inf"] {
            let csv = format!(
                "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n\
                 Asia,Kia,Online,1,2,3,4\n\
                 Europe,BMW,Dealer,2,40000,{bad},0\n"
            );
            let err = Table::from_csv_reader(csv.as_bytes()).unwrap_err();
            match err {
                DataError::NotNumeric { column, row, value } => {
                    assert_eq!(column, "Revenue");
                    assert_eq!(row, 2);
                    assert_eq!(value, bad);
                }
                other => panic!("unexpected error for {bad}: {other}"),
            }
        }
    }

    #[test]
    fn test_from_csv_reader_whole_float_units() {
        let csv = "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n\
                   Asia,Kia,Online,10.0,2,3,4\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.records()[0].units_sold, 10);
    }

    #[test]
    fn test_from_csv_reader_fractional_or_negative_units() {
        for bad in ["2.5", "-1", "NaN"] {
            let csv = format!(
                "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n\
                 Asia,Kia,Online,{bad},2,3,4\n"
            );
            let err = Table::from_csv_reader(csv.as_bytes()).unwrap_err();
            assert!(
                matches!(err, DataError::NotNumeric { ref column, .. } if column == "Units_Sold"),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn test_from_csv_reader_header_only_is_empty() {
        let csv = "Continent,Brand,Sales_Channel,Units_Sold,Unit_Price,Revenue,Discount\n";
        let err = Table::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Empty));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Table::load(Path::new("definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DataError::InputMissing { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_from_json_basic() {
        let value = serde_json::json!([
            {"Continent": "Asia", "Brand": "Toyota", "Sales_Channel": "Online",
             "Units_Sold": 10, "Unit_Price": 20000, "Revenue": 200000, "Discount": 5},
            {"Continent": "Europe", "Brand": "BMW", "Sales_Channel": "Dealer",
             "Units_Sold": "2", "Unit_Price": 40000.0, "Revenue": 80000, "Discount": 0}
        ]);
        let table = Table::from_json(&value).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].units_sold, 2);
        assert_eq!(table.records()[0].revenue, 200000.0);
    }

    #[test]
    fn test_from_json_float_units() {
        let value = serde_json::json!([
            {"Continent": "Asia", "Brand": "Toyota", "Sales_Channel": "Online",
             "Units_Sold": 10.0, "Unit_Price": 20000.0, "Revenue": 200000.0, "Discount": 5.0}
        ]);
        let table = Table::from_json(&value).unwrap();
        assert_eq!(table.records()[0].units_sold, 10);
    }

    #[test]
    fn test_from_json_missing_key() {
        let value = serde_json::json!([{"Continent": "Asia"}]);
        let err = Table::from_json(&value).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }

    #[test]
    fn test_from_json_not_array() {
        let value = serde_json::json!({"Continent": "Asia"});
        assert!(matches!(Table::from_json(&value), Err(DataError::Json(_))));
    }

    #[test]
    fn test_dimension_and_measure_accessors() {
        let r = record("Asia", "Toyota", "Online", 10, 20000.0, 200000.0, 5.0);
        assert_eq!(Dimension::SalesChannel.of(&r), "Online");
        assert_eq!(Measure::UnitsSold.of(&r), 10.0);
        assert_eq!(Measure::Discount.column(), "Discount");
    }
}
