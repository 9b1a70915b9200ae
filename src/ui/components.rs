//! Shared UI components.

use eframe::egui::{self, Color32, Response, RichText, Sense, StrokeKind, Ui};

use crate::models::{Employee, Role};

/// Height of an employee card.
pub const CARD_HEIGHT: f32 = 44.0;

/// Status indicator colors.
pub mod colors {
    use super::Color32;

    pub const SUCCESS: Color32 = Color32::from_rgb(100, 200, 100);
    pub const ERROR: Color32 = Color32::from_rgb(255, 100, 100);
    pub const WARNING: Color32 = Color32::from_rgb(255, 200, 100);
    pub const NEUTRAL: Color32 = Color32::from_rgb(150, 150, 150);
    pub const DROP_TARGET: Color32 = Color32::from_rgb(90, 160, 255);
}

/// Accent color for a role badge.
pub fn role_color(role: Role) -> Color32 {
    match role {
        Role::DepartmentHead => colors::SUCCESS,
        Role::SubDepartmentHead => Color32::from_rgb(120, 190, 220),
        Role::DeputyManager => colors::WARNING,
        Role::Staff => colors::NEUTRAL,
    }
}

/// Render a draggable employee card.
///
/// The response senses both click and drag so the caller can feed it into
/// the drag controller.
pub fn employee_card(ui: &mut Ui, employee: &Employee, width: f32, dimmed: bool) -> Response {
    let size = egui::vec2(width, CARD_HEIGHT);
    let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());

    if ui.is_rect_visible(rect) {
        paint_card(ui.painter(), ui.style().interact(&response), rect, employee, dimmed);
    }

    response.on_hover_cursor(egui::CursorIcon::Grab)
}

/// Paint card content into `rect`. Also used for the drag preview.
pub fn paint_card(
    painter: &egui::Painter,
    visuals: &egui::style::WidgetVisuals,
    rect: egui::Rect,
    employee: &Employee,
    dimmed: bool,
) {
    let text_color = if dimmed {
        visuals.text_color().gamma_multiply(0.4)
    } else {
        visuals.text_color()
    };

    painter.rect_filled(rect, 6.0, visuals.bg_fill);
    painter.rect_stroke(rect, 6.0, visuals.bg_stroke, StrokeKind::Outside);

    // Role stripe
    let stripe = egui::Rect::from_min_size(rect.min, egui::vec2(4.0, rect.height()));
    painter.rect_filled(stripe, 2.0, role_color(employee.role));

    painter.text(
        egui::pos2(rect.left() + 12.0, rect.top() + 14.0),
        egui::Align2::LEFT_CENTER,
        &employee.full_name,
        egui::FontId::proportional(14.0),
        text_color,
    );

    let subtitle = if employee.position.is_empty() {
        format!("{} · {}", employee.employee_code, employee.role.label())
    } else {
        format!("{} · {}", employee.position, employee.role.label())
    };
    painter.text(
        egui::pos2(rect.left() + 12.0, rect.bottom() - 12.0),
        egui::Align2::LEFT_CENTER,
        subtitle,
        egui::FontId::proportional(11.0),
        text_color.gamma_multiply(0.7),
    );
}

/// Render a panel header with title.
pub fn panel_header(ui: &mut Ui, title: &str) {
    ui.heading(RichText::new(title).size(24.0));
    ui.add_space(10.0);
    ui.separator();
    ui.add_space(10.0);
}

/// Pick an employee from a list, or none.
pub fn employee_combo(
    ui: &mut Ui,
    id_salt: &str,
    selected: &mut Option<i32>,
    choices: &[&Employee],
    none_label: &str,
) -> Response {
    let current = selected
        .and_then(|id| choices.iter().find(|e| e.id == id))
        .map(|e| e.full_name.clone())
        .unwrap_or_else(|| none_label.to_string());

    egui::ComboBox::from_id_salt(id_salt)
        .selected_text(current)
        .width(240.0)
        .show_ui(ui, |ui| {
            ui.selectable_value(selected, None, none_label);
            for employee in choices {
                ui.selectable_value(
                    selected,
                    Some(employee.id),
                    format!("{} ({})", employee.full_name, employee.employee_code),
                );
            }
        })
        .response
}
