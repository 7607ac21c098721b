// Input side: CSV tables, the season snapshot and per-player joining.

pub mod loader;
pub mod reference;
pub mod table;

pub use loader::{
    DataPaths, DatasetKey, DirectoryTables, HustleBasis, InMemoryTables, LeagueTable, LoadError,
    PlayerBundle, PlayerTableSource, PlayerTotals, SeasonData, TotalsRow,
};
pub use reference::{CrossReference, ReferenceField, ReferenceRow, ReferenceTable};
pub use table::{RowRef, Table, TableError};
