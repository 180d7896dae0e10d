//! eframe application shell hosting the viewer widget

use std::cell::RefCell;
use std::rc::Rc;

use crate::widget::ViewerWidget;

/// Thin eframe App wrapper. All viewing state lives in the widget's viewer,
/// which is shared with the JavaScript handle.
pub struct ViewerApp {
    widget: Rc<RefCell<ViewerWidget>>,
}

impl ViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, widget: Rc<RefCell<ViewerWidget>>) -> Self {
        Self { widget }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let size = ui.available_size();
                self.widget.borrow_mut().show(ui, size);
            });
    }
}
