//! CSV output for harvested features

use super::metadata::{GEOM_FIELD, X_FIELD, Y_FIELD};
use super::tile::FeatureRow;
use crate::error::Result;
use crate::fetch::{persist, staging_file};
use serde_json::Value;
use std::path::Path;

/// Write `rows` under a header of `field_names`, returning the row count.
///
/// The derived `X`, `Y` and `OA:geom` columns take the computed values even
/// when the layer has attributes of the same name.
pub fn write_csv(path: &Path, field_names: &[String], rows: &[FeatureRow]) -> Result<usize> {
    let mut staged = staging_file(path)?;

    {
        let mut writer = csv::Writer::from_writer(staged.as_file_mut());
        writer.write_record(field_names)?;

        for row in rows {
            let record = field_names.iter().map(|name| match name.as_str() {
                X_FIELD => row.x.to_string(),
                Y_FIELD => row.y.to_string(),
                GEOM_FIELD => row.wkt.clone(),
                _ => row.attributes.get(name).map(cell).unwrap_or_default(),
            });
            writer.write_record(record)?;
        }

        writer.flush()?;
    }

    persist(staged, path)?;
    Ok(rows.len())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
