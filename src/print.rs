//! Printable sales-report document.
//!
//! Builds a self-contained RTL HTML string from the range summary and the
//! full order list. The shell injects the document into a hidden frame and
//! invokes the platform print dialog; this module only produces the markup.
//! Every digit in the document goes through the Arabic-numeral transformer.

use crate::format::{arabic_digits, format_amount, format_count, format_quantity};
use crate::report::{OrderRecord, ReportError, ReportSummary};

/// Escape text interpolated into the document (customer and product names
/// come from the platform).
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn summary_card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"card\"><div class=\"card-value\">{value}</div><div class=\"card-label\">{label}</div></div>"
    )
}

/// Order creation timestamp as shown in the table: date and wall-clock
/// minutes, Arabic digits.
fn format_created_at(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let display = raw.trim().replace('T', " ");
    let truncated = display.get(..16).unwrap_or(&display);
    arabic_digits(truncated)
}

const STYLE: &str = "\
body { font-family: 'Segoe UI', Tahoma, sans-serif; margin: 24px; color: #1a1a1a; }\n\
h1 { font-size: 20px; margin-bottom: 4px; }\n\
.meta { color: #555; margin-bottom: 16px; }\n\
.cards { display: flex; gap: 12px; margin-bottom: 20px; }\n\
.card { border: 1px solid #ccc; border-radius: 8px; padding: 12px 20px; text-align: center; }\n\
.card-value { font-size: 18px; font-weight: bold; }\n\
.card-label { font-size: 12px; color: #555; }\n\
table { width: 100%; border-collapse: collapse; margin-bottom: 20px; }\n\
th, td { border: 1px solid #ccc; padding: 6px 8px; font-size: 12px; text-align: right; }\n\
th { background: #f3f3f3; }\n\
h2 { font-size: 16px; }\n\
@media print { body { margin: 8px; } }";

/// Build the printable report document.
///
/// Fails when there is nothing to print: an empty order list or an unset
/// date bound is reported to the caller instead of producing an empty page.
pub fn render_printable(
    summary: &ReportSummary,
    orders: &[OrderRecord],
    branch_name: &str,
    start_date: &str,
    end_date: &str,
) -> Result<String, ReportError> {
    if start_date.trim().is_empty() || end_date.trim().is_empty() {
        return Err(ReportError::MissingRange);
    }
    if orders.is_empty() {
        return Err(ReportError::EmptyOrders);
    }

    let mut doc = String::with_capacity(4096 + orders.len() * 256);
    doc.push_str("<!DOCTYPE html><html lang=\"ar\" dir=\"rtl\"><head><meta charset=\"utf-8\">");
    doc.push_str("<title>تقرير المبيعات</title><style>");
    doc.push_str(STYLE);
    doc.push_str("</style></head><body>");

    doc.push_str("<h1>تقرير المبيعات</h1>");
    doc.push_str(&format!(
        "<div class=\"meta\">{} | {}</div>",
        escape_html(branch_name),
        arabic_digits(&escape_html(&summary.date_range)),
    ));

    doc.push_str("<div class=\"cards\">");
    doc.push_str(&summary_card(
        "إجمالي المبيعات",
        &format_amount(summary.total_sales),
    ));
    doc.push_str(&summary_card(
        "عدد الطلبات",
        &format_count(summary.total_orders),
    ));
    doc.push_str(&summary_card(
        "طلبات التوصيل",
        &format_count(summary.delivery_orders),
    ));
    doc.push_str(&summary_card(
        "طلبات الاستلام",
        &format_count(summary.pickup_orders),
    ));
    doc.push_str("</div>");

    doc.push_str("<h2>الطلبات</h2><table><thead><tr>");
    doc.push_str("<th>رقم الطلب</th><th>العميل</th><th>الحالة</th><th>التاريخ</th><th>الخصم</th><th>الإجمالي</th>");
    doc.push_str("</tr></thead><tbody>");
    for order in orders {
        let number = order
            .order_number
            .clone()
            .unwrap_or_else(|| order.id.to_string());
        let customer = order.customer_name.as_deref().unwrap_or("");
        doc.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            arabic_digits(&escape_html(&number)),
            escape_html(customer),
            order.status.label(),
            format_created_at(order.created_at.as_deref()),
            format_amount(order.total_discount),
            format_amount(order.total_with_fee),
        ));
    }
    doc.push_str("</tbody></table>");

    doc.push_str("<h2>الأكثر مبيعاً</h2><table><thead><tr>");
    doc.push_str("<th>المنتج</th><th>الكمية</th><th>الإيراد</th>");
    doc.push_str("</tr></thead><tbody>");
    for product in &summary.top_products {
        doc.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&product.name),
            format_quantity(product.quantity),
            format_amount(product.revenue),
        ));
    }
    doc.push_str("</tbody></table>");

    doc.push_str("</body></html>");
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{compute_summary, DeliveryFee, OrderItem, OrderStatus, ProductRef};

    fn sample_orders() -> Vec<OrderRecord> {
        vec![OrderRecord {
            id: 7,
            order_number: Some("1007".to_string()),
            customer_name: Some("أحمد".to_string()),
            delivery_fee: Some(DeliveryFee { fee: 10.0 }),
            items: vec![OrderItem {
                product: Some(ProductRef {
                    name: "مندي".to_string(),
                }),
                product_name: None,
                quantity: 2.0,
                unit_price: 45.0,
                discount: 0.0,
                options: Vec::new(),
            }],
            total_before_fee: 90.0,
            total_discount: 0.0,
            total_with_fee: 100.0,
            status: OrderStatus::Completed,
            created_at: Some("2025-03-02T14:30:00".to_string()),
        }]
    }

    #[test]
    fn rejects_empty_orders() {
        let summary = ReportSummary::default();
        let err = render_printable(&summary, &[], "الفرع الرئيسي", "2025-03-01", "2025-03-31")
            .expect_err("empty orders must not print");
        assert_eq!(err, ReportError::EmptyOrders);
    }

    #[test]
    fn rejects_unset_date_bounds() {
        let orders = sample_orders();
        let summary = compute_summary(&orders, "2025-03-01", "2025-03-31", 0.0);
        let err = render_printable(&summary, &orders, "الفرع", "", "2025-03-31")
            .expect_err("missing start bound");
        assert_eq!(err, ReportError::MissingRange);
        let err = render_printable(&summary, &orders, "الفرع", "2025-03-01", "  ")
            .expect_err("missing end bound");
        assert_eq!(err, ReportError::MissingRange);
    }

    #[test]
    fn document_contains_summary_and_tables_in_arabic_numerals() {
        let orders = sample_orders();
        let summary = compute_summary(&orders, "2025-03-01", "2025-03-31", 0.0);
        let doc = render_printable(&summary, &orders, "الفرع الرئيسي", "2025-03-01", "2025-03-31")
            .expect("render");

        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("dir=\"rtl\""));
        assert!(doc.contains("تقرير المبيعات"));
        assert!(doc.contains("الفرع الرئيسي"));
        // Total sales 100.00 rendered with Arabic digits.
        assert!(doc.contains("١٠٠٫٠٠"));
        // Order number digits are transformed too.
        assert!(doc.contains("١٠٠٧"));
        assert!(doc.contains("مندي"));
        assert!(!doc.contains("1007"));
    }

    #[test]
    fn escapes_untrusted_names() {
        let mut orders = sample_orders();
        orders[0].customer_name = Some("<script>alert(1)</script>".to_string());
        let summary = compute_summary(&orders, "2025-03-01", "2025-03-31", 0.0);
        let doc =
            render_printable(&summary, &orders, "الفرع", "2025-03-01", "2025-03-31").expect("render");
        assert!(!doc.contains("<script>"));
        assert!(doc.contains("&lt;script&gt;"));
    }
}
