//! CSV parsing with the catalog's fixed options

use crate::error::{Error, Result};
use arrow::array::{Array, StringArray};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::io::Cursor;
use std::sync::Arc;

/// Rows per Arrow batch while reading
const READ_BATCH_SIZE: usize = 8192;

/// Parse configuration registered with every source table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Quote character
    pub quote_char: u8,
    /// Escape character; equal to `quote_char` means doubled quotes
    pub escaper: u8,
    /// First record is the header
    pub with_header: bool,
    /// Field separator
    pub separator: u8,
    /// Allow line breaks inside quoted fields
    pub allow_quoted_record_delimiter: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            quote_char: b'"',
            escaper: b'"',
            with_header: true,
            separator: b',',
            allow_quoted_record_delimiter: true,
        }
    }
}

impl CsvOptions {
    /// The options every catalog table is read with
    pub fn catalog() -> Self {
        Self::default()
    }

    fn format(&self) -> Format {
        let format = Format::default()
            .with_header(self.with_header)
            .with_delimiter(self.separator)
            .with_quote(self.quote_char);

        // Doubled quotes are the reader's default escaping
        if self.escaper == self.quote_char {
            format
        } else {
            format.with_escape(self.escaper)
        }
    }
}

/// Header of the file as an all-text schema
fn text_schema(body: &[u8], format: &Format) -> Result<Schema> {
    let (inferred, _) = format
        .infer_schema(Cursor::new(body), Some(0))
        .map_err(|e| Error::CsvParse {
            message: format!("Failed to read header: {e}"),
        })?;

    if inferred.fields().is_empty() {
        return Err(Error::CsvParse {
            message: "File has no header".to_string(),
        });
    }

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    Ok(Schema::new(fields))
}

/// Parse a CSV body into one batch. Every column is nullable text and empty
/// fields read as null.
pub fn read_csv(body: &[u8], options: &CsvOptions) -> Result<RecordBatch> {
    let format = options.format();
    let schema = Arc::new(text_schema(body, &format)?);

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .with_batch_size(READ_BATCH_SIZE)
        .with_truncated_rows(true)
        .build(Cursor::new(body))
        .map_err(|e| Error::CsvParse {
            message: e.to_string(),
        })?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::CsvParse {
            message: e.to_string(),
        })?;
    let batch = concat_batches(&schema, &batches)?;

    if !options.allow_quoted_record_delimiter {
        reject_embedded_newlines(&batch)?;
    }

    Ok(batch)
}

fn reject_embedded_newlines(batch: &RecordBatch) -> Result<()> {
    for (idx, field) in batch.schema().fields().iter().enumerate() {
        let Some(values) = batch.column(idx).as_any().downcast_ref::<StringArray>() else {
            continue;
        };
        for row in 0..values.len() {
            if values.is_valid(row) && values.value(row).contains(['\n', '\r']) {
                return Err(Error::CsvParse {
                    message: format!(
                        "Line break inside quoted field '{}' at record {}",
                        field.name(),
                        row + 1
                    ),
                });
            }
        }
    }
    Ok(())
}
