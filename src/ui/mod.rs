//! GUI panels and application state.

pub mod app;
pub mod components;
pub mod dialogs;
pub mod org_chart_panel;

pub use app::OrgChartApp;
