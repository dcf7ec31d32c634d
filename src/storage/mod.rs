//! Storage (Arrow/Parquet export)
//!
//! Traces and rank tables are exported as Arrow [`RecordBatch`]es so they can
//! be handed to any columnar tool, and persisted as Parquet.
//!
//! ```text
//! Trace ──to_record_batch()──┐
//!                            ├──> RecordBatch ──write_parquet()──> *.parquet
//! Table ──to_record_batch()──┘
//! ```

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::record::EvaluationRecord;
use crate::table::Table;
use crate::trace::Trace;
use crate::{Error, Result};

impl Trace {
    /// One row per record, in trace order (ascending `end_time`).
    ///
    /// `config_id` is the configuration id as text, with the bracket in its
    /// own column; `continued_from` is the `{id}_{bracket}` key of the
    /// lower-bracket record, or null.
    ///
    /// # Errors
    ///
    /// Returns `Error::Arrow` if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let records = self.records();
        let f64_col = |get: fn(&EvaluationRecord) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(records.iter().map(get)))
        };
        let opt_col = |get: fn(&EvaluationRecord) -> Option<f64>| -> ArrayRef {
            Arc::new(records.iter().map(get).collect::<Float64Array>())
        };

        let schema = Schema::new(vec![
            Field::new("end_time", DataType::Float64, false),
            Field::new("config_id", DataType::Utf8, false),
            Field::new("id", DataType::UInt64, false),
            Field::new("bracket", DataType::UInt32, true),
            Field::new("loss", DataType::Float64, false),
            Field::new("cost", DataType::Float64, false),
            Field::new("val_score", DataType::Float64, false),
            Field::new("test_score", DataType::Float64, false),
            Field::new("fidelity", DataType::Float64, false),
            Field::new("start_time", DataType::Float64, false),
            Field::new("max_fidelity_loss", DataType::Float64, false),
            Field::new("max_fidelity_cost", DataType::Float64, false),
            Field::new("cumulated_fidelity", DataType::Float64, true),
            Field::new("start_time_since_global_start", DataType::Float64, true),
            Field::new("end_time_since_global_start", DataType::Float64, true),
            Field::new("continued_from", DataType::Utf8, true),
            Field::new("process_id", DataType::UInt64, true),
        ]);

        let columns: Vec<ArrayRef> = vec![
            f64_col(EvaluationRecord::end_time),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.id().to_string()),
            )),
            Arc::new(UInt64Array::from_iter_values(records.iter().map(EvaluationRecord::id))),
            Arc::new(records.iter().map(EvaluationRecord::bracket).collect::<UInt32Array>()),
            f64_col(EvaluationRecord::loss),
            f64_col(EvaluationRecord::cost),
            f64_col(EvaluationRecord::val_score),
            f64_col(EvaluationRecord::test_score),
            f64_col(EvaluationRecord::fidelity),
            f64_col(EvaluationRecord::start_time),
            f64_col(EvaluationRecord::max_fidelity_loss),
            f64_col(EvaluationRecord::max_fidelity_cost),
            opt_col(EvaluationRecord::cumulated_fidelity),
            opt_col(EvaluationRecord::start_time_since_global_start),
            opt_col(EvaluationRecord::end_time_since_global_start),
            Arc::new(
                records
                    .iter()
                    .map(|r| r.continued_from().map(|key| key.to_string()))
                    .collect::<StringArray>(),
            ),
            Arc::new(records.iter().map(EvaluationRecord::process_id).collect::<UInt64Array>()),
        ];

        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}

impl Table {
    /// Index column named `index_name`, then one nullable Float64 column per
    /// table column.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidInput` if `index_name` collides with a column name
    /// - `Error::Arrow` if the batch cannot be assembled
    pub fn to_record_batch(&self, index_name: &str) -> Result<RecordBatch> {
        if self.columns().iter().any(|c| c == index_name) {
            return Err(Error::InvalidInput(format!(
                "index name `{index_name}` collides with a table column"
            )));
        }

        let mut fields = vec![Field::new(index_name, DataType::Float64, false)];
        let mut arrays: Vec<ArrayRef> =
            vec![Arc::new(Float64Array::from(self.index().to_vec()))];
        for (j, name) in self.columns().iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, true));
            arrays.push(Arc::new(
                self.rows().iter().map(|row| row[j]).collect::<Float64Array>(),
            ));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Write a batch to a Parquet file, replacing any existing file.
///
/// # Errors
///
/// Returns `Error::StorageError` if the file cannot be created or written.
pub fn write_parquet<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let file = File::create(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet file: {e}")))?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;

    writer
        .write(batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;

    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finalize Parquet file: {e}")))?;

    Ok(())
}

/// Read every record batch of a Parquet file.
///
/// # Errors
///
/// Returns `Error::StorageError` if the file cannot be read or parsed.
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    reader
        .map(|batch| {
            batch.map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))
        })
        .collect()
}
