//! Customer receipt renderer
//!
//! Lays an [`Order`] out as a list of [`ReceiptLine`]s, then renders that
//! layout either to ESC/POS bytes (thermal printer) or to plain text
//! (mock printer trace, tests). Items are grouped by course ascending and
//! keep their order inside a course.

use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use vicanto_printer::{Align, EscPosBuilder, TextSize, pad_text, text_width};

use crate::core::config::ShopInfo;
use crate::db::models::{Order, OrderItem};
use crate::utils::money::{format_eur, format_eur_decimal, round, to_decimal};
use crate::utils::time::local_date_time;

/// One logical receipt line
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptLine {
    /// Centered, bold, double size
    Title(String),
    Center(String),
    Text(String),
    Bold(String),
    /// Label left, amount right; `emphasis` prints bold double height
    Pair {
        left: String,
        right: String,
        emphasis: bool,
    },
    Separator,
    Blank,
}

/// Receipt renderer
pub struct ReceiptRenderer {
    width: usize,
    timezone: Tz,
    shop: ShopInfo,
    /// Shown on the cover line of orders without covers
    cover_price: Decimal,
}

impl ReceiptRenderer {
    /// Common widths: 58mm paper = 32 characters, 80mm paper = 48
    pub fn new(width: usize, timezone: Tz, shop: ShopInfo, cover_price: Decimal) -> Self {
        Self {
            width,
            timezone,
            shop,
            cover_price,
        }
    }

    /// Reject orders that cannot produce a meaningful receipt
    pub fn validate(order: &Order) -> Result<(), String> {
        if order.items.is_empty() {
            return Err(format!("order {} has no items", order.id));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
            return Err(format!(
                "order {} item {} has quantity {}",
                order.id, item.id, item.quantity
            ));
        }
        let mut amounts = order
            .items
            .iter()
            .map(|i| i.total_price)
            .chain([order.subtotal, order.cover_charge, order.total]);
        if amounts.any(|a| !a.is_finite()) {
            return Err(format!("order {} has a non-numeric amount", order.id));
        }
        Ok(())
    }

    /// Full customer receipt layout
    pub fn layout(&self, order: &Order) -> Vec<ReceiptLine> {
        let mut lines = Vec::new();
        self.layout_header(&mut lines);
        self.layout_order_info(&mut lines, order);
        self.layout_items(&mut lines, &order.items);
        self.layout_totals(&mut lines, order);
        self.layout_footer(&mut lines);
        lines
    }

    /// Printer self-test layout
    pub fn test_layout(&self, now_millis: i64) -> Vec<ReceiptLine> {
        let (date, time) = local_date_time(now_millis, self.timezone);
        vec![
            ReceiptLine::Title("TEST STAMPANTE".into()),
            ReceiptLine::Center(self.shop.name.clone()),
            ReceiptLine::Blank,
            ReceiptLine::Center(format!("{date} {time}")),
            ReceiptLine::Blank,
            ReceiptLine::Center("Stampante funzionante".into()),
        ]
    }

    fn layout_header(&self, lines: &mut Vec<ReceiptLine>) {
        lines.push(ReceiptLine::Title(self.shop.name.clone()));
        lines.push(ReceiptLine::Center(self.shop.address.clone()));
        lines.push(ReceiptLine::Center(self.shop.phone.clone()));
        lines.push(ReceiptLine::Separator);
        lines.push(ReceiptLine::Blank);
    }

    fn layout_order_info(&self, lines: &mut Vec<ReceiptLine>, order: &Order) {
        let (date, time) = local_date_time(order.created_at, self.timezone);
        lines.push(ReceiptLine::Bold(format!("ORDINE #{}", order.id)));
        lines.push(ReceiptLine::Text(format!("Data: {date}")));
        lines.push(ReceiptLine::Text(format!("Ora: {time}")));
        lines.push(ReceiptLine::Text(format!("Tavolo: {}", order.table_number)));
        lines.push(ReceiptLine::Text(format!("Coperti: {}", order.covers)));
        lines.push(ReceiptLine::Text(format!(
            "Cameriere: {}",
            order.waiter.as_deref().unwrap_or("-")
        )));
        if let Some(notes) = order.notes.as_deref().filter(|n| !n.is_empty()) {
            lines.push(ReceiptLine::Text(format!("Note: {notes}")));
        }
        lines.push(ReceiptLine::Separator);
        lines.push(ReceiptLine::Blank);
    }

    fn layout_items(&self, lines: &mut Vec<ReceiptLine>, items: &[OrderItem]) {
        lines.push(ReceiptLine::Bold("PRODOTTI:".into()));
        lines.push(ReceiptLine::Blank);

        let courses = group_by_course(items);
        let show_course = courses.len() > 1;

        for (course, items) in courses {
            if show_course {
                lines.push(ReceiptLine::Bold(format!("--- PORTATA {course} ---")));
            }
            for item in items {
                lines.push(ReceiptLine::Pair {
                    left: format!("{}x {}", item.quantity, item.category),
                    right: format_eur(item.total_price),
                    emphasis: false,
                });
                if !item.flavors.is_empty() {
                    lines.push(ReceiptLine::Text(format!("   {}", item.flavors.join(", "))));
                }
                if let Some(note) = item.custom_note.as_deref().filter(|n| !n.is_empty()) {
                    lines.push(ReceiptLine::Text(format!("   >> {note}")));
                }
                lines.push(ReceiptLine::Blank);
            }
        }
    }

    fn layout_totals(&self, lines: &mut Vec<ReceiptLine>, order: &Order) {
        lines.push(ReceiptLine::Separator);
        lines.push(ReceiptLine::Blank);
        lines.push(ReceiptLine::Pair {
            left: "Subtotale:".into(),
            right: format_eur(order.subtotal),
            emphasis: false,
        });
        lines.push(ReceiptLine::Pair {
            left: format!(
                "Coperto ({}x {}):",
                order.covers,
                format_eur_decimal(self.cover_unit_price(order))
            ),
            right: format_eur(order.cover_charge),
            emphasis: false,
        });
        lines.push(ReceiptLine::Separator);
        lines.push(ReceiptLine::Pair {
            left: "TOTALE:".into(),
            right: format_eur(order.total),
            emphasis: true,
        });
        lines.push(ReceiptLine::Separator);
    }

    /// Per-cover price the order was charged at
    fn cover_unit_price(&self, order: &Order) -> Decimal {
        if order.covers > 0 {
            round(to_decimal(order.cover_charge) / Decimal::from(order.covers))
        } else {
            self.cover_price
        }
    }

    fn layout_footer(&self, lines: &mut Vec<ReceiptLine>) {
        lines.push(ReceiptLine::Blank);
        lines.push(ReceiptLine::Center("Grazie e arrivederci!".into()));
        lines.push(ReceiptLine::Blank);
        lines.push(ReceiptLine::Center(self.shop.website.clone()));
    }

    /// Render a layout to ESC/POS bytes, ending with a paper cut
    pub fn render_escpos(&self, lines: &[ReceiptLine]) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);
        for line in lines {
            match line {
                ReceiptLine::Title(text) => {
                    b.align(Align::Center).size(TextSize::Double).bold(true);
                    b.line(text);
                    b.bold(false).size(TextSize::Normal).align(Align::Left);
                }
                ReceiptLine::Center(text) => {
                    b.align(Align::Center).line(text).align(Align::Left);
                }
                ReceiptLine::Text(text) => {
                    b.line(text);
                }
                ReceiptLine::Bold(text) => {
                    b.bold(true).line(text).bold(false);
                }
                ReceiptLine::Pair {
                    left,
                    right,
                    emphasis: true,
                } => {
                    b.bold(true).size(TextSize::DoubleHeight);
                    b.line_lr(left, right);
                    b.size(TextSize::Normal).bold(false);
                }
                ReceiptLine::Pair { left, right, .. } => {
                    b.line_lr(left, right);
                }
                ReceiptLine::Separator => {
                    b.rule('-');
                }
                ReceiptLine::Blank => {
                    b.newline();
                }
            }
        }
        b.cut_feed(4);
        b.build()
    }

    /// Render a layout to plain text (one `\n`-terminated line each)
    pub fn render_text(&self, lines: &[ReceiptLine]) -> String {
        let mut out = String::new();
        for line in lines {
            let text = match line {
                ReceiptLine::Title(t) | ReceiptLine::Center(t) => self.centered(t),
                ReceiptLine::Text(t) | ReceiptLine::Bold(t) => t.clone(),
                ReceiptLine::Pair { left, right, .. } => self.pair(left, right),
                ReceiptLine::Separator => "-".repeat(self.width),
                ReceiptLine::Blank => String::new(),
            };
            out.push_str(&text);
            out.push('\n');
        }
        out
    }

    fn centered(&self, text: &str) -> String {
        let pad = self.width.saturating_sub(text_width(text)) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    /// Same rule as the printer's left/right line
    fn pair(&self, left: &str, right: &str) -> String {
        let rw = text_width(right);
        if rw >= self.width {
            format!("{left} {right}")
        } else {
            format!("{}{right}", pad_text(left, self.width - rw, false))
        }
    }
}

/// Items by course ascending, insertion order kept within a course
fn group_by_course(items: &[OrderItem]) -> BTreeMap<i64, Vec<&OrderItem>> {
    let mut groups: BTreeMap<i64, Vec<&OrderItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.course).or_default().push(item);
    }
    groups
}
