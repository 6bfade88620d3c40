pub mod process;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::SolverSettings;
use crate::error::{AppError, Result};
use crate::types::{AvailabilityRecord, WantedList};

pub use process::ProcessSolver;

pub const PARAMETERS_FILE: &str = "parameters.csv";
pub const ITEMS_FILE: &str = "items.csv";
pub const AVAILABILITY_FILE: &str = "availability.csv";

/// External optimizer reading the CSV files of a working directory.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Succeeds only when the solver exits with status 0.
    async fn solve(&self, work_dir: &Path) -> Result<()>;
}

#[derive(Serialize)]
struct ParametersRow {
    #[serde(rename = "S")]
    tolerance: f64,
    #[serde(rename = "maxSellers")]
    max_sellers: u32,
}

#[derive(Serialize)]
struct ItemRow {
    id: String,
    quantity: u32,
}

/// Write the solver inputs for `wanted` into the working directory and run
/// the solver on it. The files are complete before the solver starts, so a
/// failed solve can be re-run by hand against the same directory.
pub async fn handoff(
    settings: &SolverSettings,
    wanted: &WantedList,
    availability: &[AvailabilityRecord],
    solver: &dyn Solver,
) -> Result<()> {
    let dir = settings.work_dir.as_path();
    tokio::fs::create_dir_all(dir).await?;

    let parameters = render_csv(
        &["S", "maxSellers"],
        [ParametersRow {
            tolerance: settings.tolerance,
            max_sellers: settings.max_sellers,
        }],
    )?;
    let items = render_csv(
        &["id", "quantity"],
        wanted.items.iter().map(|item| ItemRow {
            id: item.key(),
            quantity: item.quantity,
        }),
    )?;
    let table = render_csv(&["store", "id", "minBuy", "price", "quantity"], availability)?;

    tokio::fs::write(dir.join(PARAMETERS_FILE), parameters).await?;
    tokio::fs::write(dir.join(ITEMS_FILE), items).await?;
    tokio::fs::write(dir.join(AVAILABILITY_FILE), table).await?;

    info!(
        dir = %dir.display(),
        items = wanted.items.len(),
        rows = availability.len(),
        "Solver inputs written to {}, starting solver",
        dir.display(),
    );
    solver.solve(dir).await
}

/// Serialize one table in memory. The header row is written explicitly so
/// an empty table still has one.
fn render_csv<T: Serialize>(headers: &[&str], rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| AppError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{wanted, RecordingSolver};

    fn settings(dir: &Path) -> SolverSettings {
        SolverSettings {
            work_dir: dir.join("simplex"),
            tolerance: 2.5,
            max_sellers: 7,
            ..SolverSettings::default()
        }
    }

    fn read(dir: &Path, file: &str) -> String {
        std::fs::read_to_string(dir.join(file)).unwrap()
    }

    #[tokio::test]
    async fn writes_all_three_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path());
        let mut list = WantedList::new("42");
        list.items = vec![wanted("3001", 4)];
        let rows = vec![
            AvailabilityRecord {
                store: "alpha".into(),
                id: "3001:X:X".into(),
                min_buy: None,
                price: 0.25,
                quantity: 12,
            },
            AvailabilityRecord {
                store: "beta".into(),
                id: "3001:X:X".into(),
                min_buy: Some(10.0),
                price: 0.5,
                quantity: 3,
            },
        ];
        let solver = RecordingSolver::exiting_with(0);

        handoff(&settings, &list, &rows, &solver).await.unwrap();

        let dir = &settings.work_dir;
        assert_eq!(read(dir, PARAMETERS_FILE), "S,maxSellers\n2.5,7\n");
        assert_eq!(read(dir, ITEMS_FILE), "id,quantity\n3001:X:X,4\n");
        assert_eq!(
            read(dir, AVAILABILITY_FILE),
            "store,id,minBuy,price,quantity\nalpha,3001:X:X,,0.25,12\nbeta,3001:X:X,10.0,0.5,3\n"
        );
        assert_eq!(*solver.calls.lock().unwrap(), vec![dir.clone()]);
    }

    #[test]
    fn tables_render_in_memory_with_quoting() {
        let rows = [ItemRow { id: "3001,b:X:X".into(), quantity: 2 }];
        let bytes = render_csv(&["id", "quantity"], rows).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "id,quantity\n\"3001,b:X:X\",2\n");
    }

    #[tokio::test]
    async fn empty_availability_keeps_header() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path());
        let solver = RecordingSolver::exiting_with(0);

        handoff(&settings, &WantedList::new("42"), &[], &solver).await.unwrap();
        assert_eq!(
            read(&settings.work_dir, AVAILABILITY_FILE),
            "store,id,minBuy,price,quantity\n"
        );
    }

    #[tokio::test]
    async fn solver_failure_surfaces_after_files_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path());
        let solver = RecordingSolver::exiting_with(2);

        let err = handoff(&settings, &WantedList::new("42"), &[], &solver)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Solver { code: Some(2) }));
        assert_eq!(err.exit_code(), 2);
        for file in [PARAMETERS_FILE, ITEMS_FILE, AVAILABILITY_FILE] {
            assert!(settings.work_dir.join(file).exists());
        }
    }
}
