//! Root crate facade for the memtable core and HTTP server.

pub use memtable_core::{
    action, diff, grid, pipeline, preview_batch, prompt, run_batch, BatchGate, BatchOptions,
    BatchReport, DiffEngine, Sheet, SheetDomain, SheetType,
};
pub use memtable_server::{
    config, create_app, db, error, handlers, models, resolve_bind_address, serve_router,
    AppError, AppState, Config, Database,
};
