//! Main application UI.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use eframe::egui::{self, Align, Layout, RichText, ScrollArea};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::orgchart::health::{self, DepartmentWarning};
use crate::orgchart::{
    ChannelDialog, DepartmentEdit, DragController, DropOutcome, DropRequest, EditReport, NoOpReason, OrgTree,
    ReassignPhase, Reassigner, Reconciler, SuccessionResponder, SweepReport, spawn_reconciler,
};
use crate::store::{ChangeEvent, DocumentStore, Snapshot};

use super::components::colors;
use super::dialogs::{self, DepartmentForm, DialogResult, SuccessionState};
use super::org_chart_panel::{self, ChartAction};

/// Messages from async tasks to UI.
pub enum UiMessage {
    SnapshotLoaded(Snapshot),
    LoadError(String),
    DropFinished(DropRequest, Result<DropOutcome, AppError>),
    DepartmentSaved(EditReport),
    DepartmentFailed(String),
    SweepFinished(SweepReport),
    SweepFailed(String),
}

/// Log level for UI messages.
#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Log entry for display in the UI.
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

/// Main application state.
pub struct OrgChartApp {
    // Runtime and data
    pub rt: tokio::runtime::Runtime,
    pub store: Arc<dyn DocumentStore>,
    reassigner: Arc<Reassigner<dyn DocumentStore>>,
    reconciler: Arc<Reconciler>,
    reconciler_task: Option<JoinHandle<()>>,

    // Message channels for async communication
    tx: mpsc::UnboundedSender<UiMessage>,
    rx: mpsc::UnboundedReceiver<UiMessage>,
    dialog: ChannelDialog,
    succession_rx: mpsc::UnboundedReceiver<SuccessionResponder>,
    changes: broadcast::Receiver<ChangeEvent>,
    phase: watch::Receiver<ReassignPhase>,

    // Cached data
    pub snapshot: Snapshot,
    pub tree: OrgTree,
    pub warnings: Vec<DepartmentWarning>,

    // Interaction
    pub drag: DragController,
    pub is_loading: bool,
    pub is_busy: bool,
    reload_pending: bool,

    // Dialogs
    succession: Option<SuccessionState>,
    department_form: Option<DepartmentForm>,
    pub error_message: Option<String>,
    pub success_message: Option<String>,

    // Log messages
    pub log_messages: Vec<LogEntry>,

    // Configuration
    pub config: AppConfig,
}

impl OrgChartApp {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig, rt: tokio::runtime::Runtime) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (dialog, succession_rx) = ChannelDialog::new();
        let reassigner = Arc::new(Reassigner::new(store.clone()));
        let reconciler = Arc::new(Reconciler::with_locks(reassigner.locks().clone()));
        let phase = reassigner.phase();
        let changes = store.subscribe();

        let reconciler_task = config.orgchart.reconcile_on_change.then(|| {
            let _guard = rt.enter();
            spawn_reconciler(store.clone(), reconciler.clone())
        });

        let mut app = Self {
            rt,
            store,
            reassigner,
            reconciler,
            reconciler_task,
            tx,
            rx,
            dialog,
            succession_rx,
            changes,
            phase,
            snapshot: Snapshot::default(),
            tree: OrgTree::default(),
            warnings: Vec::new(),
            drag: DragController::new(config.orgchart.drag_activation_distance),
            is_loading: false,
            is_busy: false,
            reload_pending: false,
            succession: None,
            department_form: None,
            error_message: None,
            success_message: None,
            log_messages: Vec::new(),
            config,
        };

        app.load_snapshot();
        app
    }

    /// Log a message to the UI log.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log_messages.push(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            level,
        });

        // Keep only last 100 messages
        if self.log_messages.len() > 100 {
            self.log_messages.remove(0);
        }
    }

    /// Load both collections from the store.
    pub fn load_snapshot(&mut self) {
        if self.is_loading {
            self.reload_pending = true;
            return;
        }
        self.is_loading = true;

        let store = self.store.clone();
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            match store.snapshot().await {
                Ok(snapshot) => {
                    let _ = tx.send(UiMessage::SnapshotLoaded(snapshot));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::LoadError(e.to_string()));
                }
            }
        });
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.tree = OrgTree::build(&snapshot, self.config.orgchart.show_inactive);
        self.warnings = health::check(&snapshot);
        self.snapshot = snapshot;
    }

    /// Hand a drop to the reassignment workflow.
    fn start_drop(&mut self, drop: DropRequest) {
        self.is_busy = true;
        let reassigner = self.reassigner.clone();
        let dialog = self.dialog.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            let result = reassigner.handle_drop(drop, &dialog).await;
            let _ = tx.send(UiMessage::DropFinished(drop, result));
        });
    }

    /// Save the department edit form.
    fn save_department(&mut self, department_id: i32, edit: DepartmentEdit) {
        let reassigner = self.reassigner.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            match reassigner.edit_department(department_id, &edit).await {
                Ok(report) => {
                    let _ = tx.send(UiMessage::DepartmentSaved(report));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::DepartmentFailed(e.user_message()));
                }
            }
        });
    }

    /// Run the consistency sweep on demand.
    fn run_sweep(&mut self) {
        let store = self.store.clone();
        let reconciler = self.reconciler.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            match reconciler.run_once(store.as_ref()).await {
                Ok(report) => {
                    let _ = tx.send(UiMessage::SweepFinished(report));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::SweepFailed(e.to_string()));
                }
            }
        });
    }

    fn employee_name(&self, id: i32) -> String {
        self.snapshot
            .employee(id)
            .map(|e| e.full_name.clone())
            .unwrap_or_else(|| format!("Employee #{id}"))
    }

    fn department_name(&self, id: i32) -> String {
        self.snapshot
            .department(id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("Department #{id}"))
    }

    /// Poll for async results.
    fn poll_async_results(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                UiMessage::SnapshotLoaded(snapshot) => {
                    self.is_loading = false;
                    self.apply_snapshot(snapshot);
                    if std::mem::take(&mut self.reload_pending) {
                        self.load_snapshot();
                    }
                }
                UiMessage::LoadError(e) => {
                    // Keep showing the last good snapshot.
                    self.is_loading = false;
                    self.reload_pending = false;
                    tracing::warn!("Failed to load org chart: {}", e);
                    self.log(LogLevel::Error, format!("Failed to load org chart: {e}"));
                }
                UiMessage::DropFinished(drop, result) => {
                    self.is_busy = false;
                    self.handle_drop_result(drop, result);
                }
                UiMessage::DepartmentSaved(report) => {
                    let name = report.department.name.clone();
                    self.department_form = None;
                    if let Some(id) = report.promoted {
                        let promoted = self.employee_name(id);
                        self.log(LogLevel::Success, format!("{promoted} now leads {name}"));
                    }
                    for id in &report.demoted {
                        let demoted = self.employee_name(*id);
                        self.log(LogLevel::Info, format!("{demoted} is no longer head of {name}"));
                    }
                    self.success_message = Some(format!("Department '{name}' saved"));
                    self.load_snapshot();
                }
                UiMessage::DepartmentFailed(e) => {
                    if let Some(form) = &mut self.department_form {
                        form.saving = false;
                        form.error = Some(e.clone());
                    }
                    self.log(LogLevel::Error, e);
                }
                UiMessage::SweepFinished(report) => {
                    if report.is_clean() {
                        self.log(LogLevel::Info, "Consistency sweep: nothing to repair");
                    } else {
                        for id in &report.cleared {
                            let name = self.department_name(*id);
                            self.log(LogLevel::Warning, format!("Cleared invalid manager on {name}"));
                        }
                        for (id, reason) in &report.failed {
                            let name = self.department_name(*id);
                            self.log(LogLevel::Error, format!("Could not repair {name}: {reason}"));
                        }
                    }
                }
                UiMessage::SweepFailed(e) => {
                    self.error_message = Some(e.clone());
                    self.log(LogLevel::Error, e);
                }
            }
        }

        // Succession requests from the reassignment workflow
        while let Ok(responder) = self.succession_rx.try_recv() {
            if self.succession.is_some() {
                // One drop at a time; a second request means the first was abandoned.
                tracing::warn!("Replacing stale succession request");
            }
            self.succession = Some(SuccessionState::new(responder));
        }

        // Store changes, ours and the reconciler's
        let mut changed = false;
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => break,
            }
        }
        if changed {
            self.load_snapshot();
        }
    }

    fn handle_drop_result(&mut self, drop: DropRequest, result: Result<DropOutcome, AppError>) {
        let employee = self.employee_name(drop.employee_id);
        match result {
            Ok(DropOutcome::Moved(report)) => {
                let to = self.department_name(report.to.zone_id());
                self.log(LogLevel::Success, format!("Moved {employee} to {to}"));
                for (department_id, successor) in &report.successors {
                    let department = self.department_name(*department_id);
                    let message = match successor {
                        Some(id) => format!("{} now leads {department}", self.employee_name(*id)),
                        None => format!("{department} has no manager"),
                    };
                    self.log(LogLevel::Info, message);
                }
            }
            Ok(DropOutcome::Cancelled) => {
                self.log(LogLevel::Info, format!("Move of {employee} cancelled"));
            }
            Ok(DropOutcome::Unchanged(NoOpReason::SameContainer)) => {}
            Ok(DropOutcome::Unchanged(NoOpReason::InvalidTarget)) => {
                self.log(LogLevel::Warning, format!("{employee} cannot be moved there"));
            }
            Err(e) => {
                self.error_message = Some(e.user_message());
                self.log(LogLevel::Error, format!("Failed to move {employee}: {e}"));
            }
        }
        self.succession = None;
    }

    /// Render menu bar.
    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("View", |ui| {
                    if ui
                        .checkbox(&mut self.config.orgchart.show_inactive, "Show inactive")
                        .changed()
                    {
                        self.apply_snapshot(self.snapshot.clone());
                        ui.close();
                    }
                    ui.checkbox(&mut self.config.ui.show_warnings, "Show warnings");
                });
                ui.menu_button("Tools", |ui| {
                    if ui.button("Run Consistency Sweep").clicked() {
                        self.run_sweep();
                        ui.close();
                    }
                    if ui.button("Reload").clicked() {
                        self.load_snapshot();
                        ui.close();
                    }
                });
            });
        });
    }

    /// Render status bar (display only, no interaction).
    fn show_status_bar(&self, ctx: &egui::Context) {
        let phase = *self.phase.borrow();
        egui::TopBottomPanel::bottom("status_bar")
            .min_height(28.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let (color, text) = match phase {
                        ReassignPhase::Idle => (colors::NEUTRAL, "Ready".to_string()),
                        ReassignPhase::EvaluatingManagerStatus { employee_id } => {
                            (colors::WARNING, format!("Checking {}...", self.employee_name(employee_id)))
                        }
                        ReassignPhase::AwaitingSuccession { department_id, .. } => (
                            colors::WARNING,
                            format!("Waiting for a new manager of {}", self.department_name(department_id)),
                        ),
                        ReassignPhase::Moving { employee_id } => {
                            (colors::WARNING, format!("Moving {}...", self.employee_name(employee_id)))
                        }
                    };
                    if !matches!(phase, ReassignPhase::Idle) {
                        ui.spinner();
                    }
                    ui.colored_label(color, text);

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let (color, text) = if self.reconciler_task.is_some() {
                            (colors::SUCCESS, "Auto-repair on")
                        } else {
                            (colors::NEUTRAL, "Auto-repair off")
                        };
                        ui.colored_label(color, text);
                        ui.label(format!(
                            "{} departments, {} employees",
                            self.snapshot.departments.len(),
                            self.snapshot.employees.len()
                        ));
                    });
                });
            });
    }

    /// Render the activity log.
    fn show_activity(&self, ctx: &egui::Context) {
        egui::SidePanel::right("activity")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.label(RichText::new("Activity").strong());
                ui.separator();
                ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
                    for entry in &self.log_messages {
                        let color = match entry.level {
                            LogLevel::Info => ui.visuals().text_color(),
                            LogLevel::Success => colors::SUCCESS,
                            LogLevel::Warning => colors::WARNING,
                            LogLevel::Error => colors::ERROR,
                        };
                        ui.horizontal_wrapped(|ui| {
                            ui.label(RichText::new(entry.timestamp.format("%H:%M:%S").to_string()).weak());
                            ui.colored_label(color, &entry.message);
                        });
                    }
                });
            });
    }

    /// Render modal dialogs (succession, department edit, error, success).
    fn show_dialogs(&mut self, ctx: &egui::Context) {
        if let Some(state) = &mut self.succession {
            match dialogs::succession_dialog(ctx, state) {
                DialogResult::Open => {}
                // The workflow reports the outcome through DropFinished.
                DialogResult::Done => self.succession = None,
                DialogResult::Cancelled => {
                    if let Some(state) = self.succession.take() {
                        state.responder.cancel();
                    }
                }
            }
        }

        if let Some(form) = &mut self.department_form {
            let (result, submitted) = dialogs::department_dialog(ctx, form, &self.snapshot);
            if let Some(edit) = submitted {
                form.saving = true;
                let department_id = form.department_id;
                self.save_department(department_id, edit);
            } else if result == DialogResult::Cancelled {
                self.department_form = None;
            }
        }

        // Error dialog
        if let Some(ref error) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::ERROR, error);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }

        // Success dialog
        if let Some(ref msg) = self.success_message.clone() {
            egui::Window::new("Success")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::SUCCESS, msg);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.success_message = None;
                    }
                });
        }
    }

    fn handle_chart_action(&mut self, action: ChartAction) {
        match action {
            ChartAction::Drop(drop) => self.start_drop(drop),
            ChartAction::EditDepartment(id) => {
                self.department_form = DepartmentForm::edit(&self.snapshot, id);
            }
            ChartAction::Refresh => self.load_snapshot(),
        }
    }
}

impl eframe::App for OrgChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll async results
        self.poll_async_results();

        // Background tasks report through channels; keep polling.
        if self.is_busy || self.is_loading {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(500));
        }

        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);
        self.show_activity(ctx);
        self.show_dialogs(ctx);

        let action = egui::CentralPanel::default()
            .show(ctx, |ui| org_chart_panel::show(self, ui))
            .inner;
        if let Some(action) = action {
            self.handle_chart_action(action);
        }
    }
}

impl Drop for OrgChartApp {
    fn drop(&mut self) {
        if let Some(task) = self.reconciler_task.take() {
            task.abort();
        }
    }
}
