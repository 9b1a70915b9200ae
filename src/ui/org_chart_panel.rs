//! Org chart panel: nested department drop zones with draggable cards.

use eframe::egui::{self, CornerRadius, Margin, RichText, ScrollArea, Stroke, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, CROWN, PENCIL_SIMPLE, USERS, WARNING};

use super::app::OrgChartApp;
use super::components::{self, CARD_HEIGHT, colors};
use crate::orgchart::{DragController, DragState, DropRequest, OrgNode};
use crate::store::Snapshot;

/// What the user asked for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartAction {
    Drop(DropRequest),
    EditDepartment(i32),
    Refresh,
}

/// A rendered drop zone.
struct Zone {
    id: i32,
    rect: egui::Rect,
    depth: usize,
}

struct RenderCtx<'a> {
    snapshot: &'a Snapshot,
    drag: &'a mut DragController,
    card_width: f32,
    interactive: bool,
    flagged: &'a [i32],
    zones: Vec<Zone>,
    action: Option<ChartAction>,
}

/// Show the org chart.
pub fn show(app: &mut OrgChartApp, ui: &mut Ui) -> Option<ChartAction> {
    let mut action = None;

    ui.horizontal(|ui| {
        components::panel_header(ui, "Org Chart");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button(format!("{ARROWS_CLOCKWISE} Refresh")).clicked() {
                action = Some(ChartAction::Refresh);
            }
            if app.is_loading {
                ui.spinner();
            }
        });
    });

    if app.config.ui.show_warnings && !app.warnings.is_empty() {
        egui::Frame::new()
            .fill(colors::WARNING.gamma_multiply(0.15))
            .inner_margin(Margin::same(8))
            .corner_radius(CornerRadius::same(6))
            .show(ui, |ui| {
                for warning in &app.warnings {
                    ui.colored_label(colors::WARNING, format!("{WARNING} {warning}"));
                }
            });
        ui.add_space(8.0);
    }

    let flagged: Vec<i32> = app.warnings.iter().map(|w| w.department_id).collect();
    let mut ctx = RenderCtx {
        snapshot: &app.snapshot,
        drag: &mut app.drag,
        card_width: app.config.ui.card_width,
        interactive: !app.is_busy,
        flagged: &flagged,
        zones: Vec::new(),
        action: None,
    };

    ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
        for node in &app.tree.roots {
            render_node(ui, node, 0, &mut ctx);
            ui.add_space(12.0);
        }

        if !app.tree.unassigned.is_empty() {
            ui.add_space(8.0);
            ui.label(RichText::new("Unassigned").strong());
            ui.horizontal_wrapped(|ui| {
                for employee in &app.tree.unassigned {
                    let response = components::employee_card(ui, employee, ctx.card_width, false);
                    track_card(&mut ctx, employee.id, &response);
                }
            });
        }
    });

    finish_drag(ui, &mut ctx);
    action.or(ctx.action)
}

fn render_node(ui: &mut Ui, node: &OrgNode, depth: usize, ctx: &mut RenderCtx<'_>) {
    let department = &node.department;
    let hovered = ctx.drag.hovered_zone() == Some(department.id);
    let stroke = if hovered {
        Stroke::new(2.0, colors::DROP_TARGET)
    } else if ctx.flagged.contains(&department.id) {
        Stroke::new(1.0, colors::WARNING)
    } else {
        ui.visuals().widgets.noninteractive.bg_stroke
    };

    let frame = egui::Frame::new()
        .fill(ui.visuals().extreme_bg_color)
        .stroke(stroke)
        .inner_margin(Margin::same(10))
        .corner_radius(CornerRadius::same(8))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                let title = RichText::new(&department.name).size(16.0).strong();
                if department.is_active {
                    ui.label(title);
                } else {
                    ui.label(title.weak());
                    ui.label(RichText::new("(inactive)").weak());
                }
                ui.label(RichText::new(format!("{USERS} {}", node.head_count())).weak());

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(ctx.interactive, egui::Button::new(PENCIL_SIMPLE))
                        .on_hover_text("Edit department")
                        .clicked()
                    {
                        ctx.action = Some(ChartAction::EditDepartment(department.id));
                    }
                });
            });

            let manager = department.manager_id.and_then(|id| ctx.snapshot.employee(id));
            let deputy = department.deputy_manager_id.and_then(|id| ctx.snapshot.employee(id));
            ui.horizontal(|ui| {
                match manager {
                    Some(m) => ui.label(format!("{CROWN} {}", m.full_name)),
                    None => ui.colored_label(colors::WARNING, format!("{CROWN} No manager")),
                };
                if let Some(d) = deputy {
                    ui.label(RichText::new(format!("Deputy: {}", d.full_name)).weak());
                }
            });
            ui.add_space(6.0);

            if node.members.is_empty() {
                ui.add_sized(
                    [ctx.card_width, CARD_HEIGHT],
                    egui::Label::new(RichText::new("Drop employees here").weak()),
                );
            } else {
                ui.horizontal_wrapped(|ui| {
                    for employee in &node.members {
                        let dimmed = !employee.is_active || ctx.drag.dragged_employee() == Some(employee.id);
                        let response = components::employee_card(ui, employee, ctx.card_width, dimmed);
                        track_card(ctx, employee.id, &response);
                    }
                });
            }

            for child in &node.children {
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    ui.add_space(16.0);
                    ui.vertical(|ui| render_node(ui, child, depth + 1, ctx));
                });
            }
        });

    if department.is_active {
        ctx.zones.push(Zone {
            id: department.id,
            rect: frame.response.rect,
            depth,
        });
    }
}

/// Feed card pointer events into the drag controller.
fn track_card(ctx: &mut RenderCtx<'_>, employee_id: i32, response: &egui::Response) {
    if !ctx.interactive {
        return;
    }
    if response.drag_started()
        && let Some(pos) = response.interact_pointer_pos()
    {
        ctx.drag.pointer_down(employee_id, [pos.x, pos.y]);
    }
    if response.dragged()
        && let Some(pos) = response.interact_pointer_pos()
    {
        ctx.drag.pointer_move([pos.x, pos.y]);
    }
}

/// Resolve the hovered zone, draw the preview and turn a release into a drop.
fn finish_drag(ui: &mut Ui, ctx: &mut RenderCtx<'_>) {
    if matches!(ctx.drag.state(), DragState::Idle) {
        return;
    }

    if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
        ctx.drag.cancel();
        return;
    }

    let pointer = ui.input(|i| i.pointer.latest_pos());
    let zone = pointer.and_then(|pos| {
        ctx.zones
            .iter()
            .filter(|z| z.rect.contains(pos))
            .max_by_key(|z| z.depth)
            .map(|z| z.id)
    });
    ctx.drag.hover(zone);

    if let (DragState::Dragging { employee_id, .. }, Some(pos)) = (ctx.drag.state(), pointer)
        && let Some(employee) = ctx.snapshot.employee(employee_id)
    {
        let painter = ui
            .ctx()
            .layer_painter(egui::LayerId::new(egui::Order::Tooltip, egui::Id::new("drag_preview")));
        let rect = egui::Rect::from_min_size(
            pos - egui::vec2(ctx.card_width / 2.0, CARD_HEIGHT / 2.0),
            egui::vec2(ctx.card_width, CARD_HEIGHT),
        );
        components::paint_card(&painter, &ui.visuals().widgets.active, rect, employee, false);
        ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
    }

    if ui.input(|i| i.pointer.any_released())
        && let Some(drop) = ctx.drag.release()
    {
        ctx.action = Some(ChartAction::Drop(drop));
    }
}
