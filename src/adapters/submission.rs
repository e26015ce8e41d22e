//! Submission artifact: prediction rows as a three-column CSV file.
//!
//! Each submission is staged in its own uniquely named temp file which is
//! removed when the handle drops, on success and on error alike.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::error::SiglabError;
use crate::domain::prediction::PredictionRow;
use crate::ports::gateway_port::{SubmissionStatus, TradingGateway};

pub const SUBMISSION_HEADER: [&str; 3] = ["id", "predictions", "round_no"];

fn write_error(e: csv::Error) -> SiglabError {
    SiglabError::Io(e.into())
}

/// Serialize `rows` as `id,predictions,round_no` with no index column.
pub fn write_submission<W: Write>(rows: &[PredictionRow], writer: W) -> Result<(), SiglabError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(SUBMISSION_HEADER).map_err(write_error)?;
    }
    for row in rows {
        wtr.serialize(row).map_err(write_error)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[PredictionRow]) -> Result<String, SiglabError> {
    let mut buf = Vec::new();
    write_submission(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| SiglabError::Io(std::io::Error::other(e)))
}

/// Write `rows` to a fresh temp file. The file is deleted when the returned
/// handle drops.
pub fn stage(rows: &[PredictionRow]) -> Result<NamedTempFile, SiglabError> {
    let mut file = tempfile::Builder::new()
        .prefix("siglab-submission-")
        .suffix(".csv")
        .tempfile()?;
    write_submission(rows, file.as_file_mut())?;
    file.as_file_mut().flush()?;
    tracing::debug!(path = %file.path().display(), rows = rows.len(), "submission staged");
    Ok(file)
}

/// Parse a submission file, requiring exactly the three submission columns.
pub fn read_submission(path: &Path) -> Result<Vec<PredictionRow>, SiglabError> {
    let invalid = |reason: String| SiglabError::gateway(format!("invalid submission {}: {}", path.display(), reason));

    let mut rdr = csv::Reader::from_path(path).map_err(|e| invalid(e.to_string()))?;
    let headers = rdr.headers().map_err(|e| invalid(e.to_string()))?.clone();
    if headers.iter().ne(SUBMISSION_HEADER) {
        return Err(invalid(format!(
            "expected columns {:?}, found {:?}",
            SUBMISSION_HEADER,
            headers.iter().collect::<Vec<_>>()
        )));
    }

    rdr.deserialize()
        .map(|row| row.map_err(|e: csv::Error| invalid(e.to_string())))
        .collect()
}

/// Stage `rows` and hand the file to the gateway.
pub fn submit(gateway: &dyn TradingGateway, rows: &[PredictionRow]) -> Result<SubmissionStatus, SiglabError> {
    let staged = stage(rows)?;
    let status = gateway.submit_predictions(staged.path())?;
    tracing::info!(rows = status.rows, accepted = status.accepted, "predictions submitted");
    Ok(status)
}
