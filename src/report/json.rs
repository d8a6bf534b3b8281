use anyhow::{Context, Result};

use super::{Presenter, RunReport};
use crate::ui::prelude::*;

/// The report as the final event of the JSON Lines stream, under the
/// `report` code.
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn render(&self, report: &RunReport) -> Result<()> {
        let data = serde_json::to_value(report).context("serializing run report")?;
        let summary = if report.has_failures() {
            "run finished with failures"
        } else {
            "run finished"
        };
        emit(Level::Info, "report", summary, Some(data));
        Ok(())
    }
}
