//! Succession modal and department edit window.

use eframe::egui::{self, Align, Layout, RichText};
use egui_phosphor::regular::WARNING;

use super::components::{self, colors};
use crate::orgchart::{DepartmentEdit, SuccessionChoice, SuccessionResponder, tree};
use crate::store::Snapshot;

/// Open succession request with the user's current selection.
pub struct SuccessionState {
    pub responder: SuccessionResponder,
    pub selected: Option<i32>,
    pub error: Option<String>,
}

impl SuccessionState {
    pub fn new(responder: SuccessionResponder) -> Self {
        let selected = responder.prompt().candidates.first().map(|c| c.id);
        Self {
            responder,
            selected,
            error: None,
        }
    }
}

/// Result of rendering a dialog for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResult {
    Open,
    Done,
    Cancelled,
}

/// Ask who replaces the manager leaving a department.
pub fn succession_dialog(ctx: &egui::Context, state: &mut SuccessionState) -> DialogResult {
    let prompt = state.responder.prompt().clone();
    let mut result = DialogResult::Open;
    let mut open = true;

    egui::Window::new("Choose Replacement Manager")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .open(&mut open)
        .show(ctx, |ui| {
            ui.label(format!(
                "{} leads {}. Who takes over after the move?",
                prompt.outgoing.full_name, prompt.department.name
            ));
            ui.add_space(10.0);

            if prompt.candidates.is_empty() {
                ui.colored_label(
                    colors::WARNING,
                    format!("{WARNING} Nobody else is in {}. It will have no manager.", prompt.department.name),
                );
            } else {
                for candidate in &prompt.candidates {
                    let label = if candidate.position.is_empty() {
                        candidate.full_name.clone()
                    } else {
                        format!("{} ({})", candidate.full_name, candidate.position)
                    };
                    ui.radio_value(&mut state.selected, Some(candidate.id), label);
                }
            }

            if let Some(error) = &state.error {
                ui.add_space(6.0);
                ui.colored_label(colors::ERROR, error);
            }

            ui.add_space(10.0);
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Cancel").clicked() {
                    result = DialogResult::Cancelled;
                }
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    let choice = match state.selected {
                        Some(id) => Some(SuccessionChoice::Replace(id)),
                        None if prompt.allows_vacancy() => Some(SuccessionChoice::LeaveVacant),
                        None => None,
                    };
                    if ui.add_enabled(choice.is_some(), egui::Button::new("Confirm Move")).clicked()
                        && let Some(choice) = choice
                    {
                        match state.responder.choose(choice) {
                            Ok(()) => result = DialogResult::Done,
                            Err(e) => state.error = Some(e.user_message()),
                        }
                    }
                });
            });
        });

    if !open {
        result = DialogResult::Cancelled;
    }
    result
}

/// Department edit form state.
pub struct DepartmentForm {
    pub department_id: i32,
    pub edit: DepartmentEdit,
    pub display_order: String,
    pub error: Option<String>,
    pub saving: bool,
}

impl DepartmentForm {
    /// Create a form pre-filled for editing an existing department.
    pub fn edit(snapshot: &Snapshot, department_id: i32) -> Option<Self> {
        let department = snapshot.department(department_id)?;
        Some(Self {
            department_id,
            edit: DepartmentEdit::from_department(department),
            display_order: department.display_order.to_string(),
            error: None,
            saving: false,
        })
    }

    /// Parse the text fields into the edit.
    pub fn submit(&mut self) -> Option<DepartmentEdit> {
        match self.display_order.trim().parse::<i32>() {
            Ok(order) => {
                self.edit.display_order = order;
                self.error = None;
                Some(self.edit.clone())
            }
            Err(_) => {
                self.error = Some("Display order must be a number".to_string());
                None
            }
        }
    }
}

/// Render the department edit window.
///
/// Returns the edit to save when the user clicks Save.
pub fn department_dialog(
    ctx: &egui::Context,
    form: &mut DepartmentForm,
    snapshot: &Snapshot,
) -> (DialogResult, Option<DepartmentEdit>) {
    let mut result = DialogResult::Open;
    let mut submitted = None;
    let mut open = true;
    let department_id = form.department_id;

    let parents: Vec<_> = snapshot
        .departments
        .iter()
        .filter(|d| !tree::is_within(&snapshot.departments, department_id, d.id))
        .collect();
    let mut employees: Vec<_> = snapshot.employees.iter().filter(|e| e.is_active).collect();
    employees.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    let members: Vec<_> = employees
        .iter()
        .copied()
        .filter(|e| e.is_member_of(department_id) && Some(e.id) != form.edit.manager_id)
        .collect();

    egui::Window::new("Edit Department")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .open(&mut open)
        .show(ctx, |ui| {
            ui.add_enabled_ui(!form.saving, |ui| {
                egui::Grid::new("department_form_grid")
                    .num_columns(2)
                    .spacing([20.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Name:");
                        ui.text_edit_singleline(&mut form.edit.name);
                        ui.end_row();

                        ui.label("Parent:");
                        let parent_text = form
                            .edit
                            .parent_id
                            .and_then(|id| snapshot.department(id))
                            .map(|d| d.name.clone())
                            .unwrap_or_else(|| "(top level)".to_string());
                        egui::ComboBox::from_id_salt("department_parent")
                            .selected_text(parent_text)
                            .width(240.0)
                            .show_ui(ui, |ui| {
                                ui.selectable_value(&mut form.edit.parent_id, None, "(top level)");
                                for parent in &parents {
                                    ui.selectable_value(&mut form.edit.parent_id, Some(parent.id), parent.name.as_str());
                                }
                            });
                        ui.end_row();

                        ui.label("Display order:");
                        ui.text_edit_singleline(&mut form.display_order);
                        ui.end_row();

                        ui.label("Active:");
                        ui.checkbox(&mut form.edit.is_active, "");
                        ui.end_row();

                        ui.label("Manager:");
                        components::employee_combo(
                            ui,
                            "department_manager",
                            &mut form.edit.manager_id,
                            &employees,
                            "(none)",
                        );
                        ui.end_row();

                        ui.label("Deputy:");
                        components::employee_combo(
                            ui,
                            "department_deputy",
                            &mut form.edit.deputy_manager_id,
                            &members,
                            "(none)",
                        );
                        ui.end_row();
                    });
            });

            if let Some(manager) = form.edit.manager_id.and_then(|id| snapshot.employee(id))
                && !manager.is_member_of(department_id)
            {
                ui.add_space(6.0);
                ui.label(RichText::new(format!("{} will be moved into this department.", manager.full_name)).weak());
            }

            if let Some(error) = &form.error {
                ui.add_space(6.0);
                ui.colored_label(colors::ERROR, error);
            }

            ui.add_space(10.0);
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Cancel").clicked() {
                    result = DialogResult::Cancelled;
                }
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if form.saving {
                        ui.spinner();
                    } else if ui.button("Save").clicked() {
                        submitted = form.submit();
                    }
                });
            });
        });

    if !open {
        result = DialogResult::Cancelled;
    }
    (result, submitted)
}
