//! Database-backed scenarios
//!
//! These run against a real PostgreSQL when `TEST_DATABASE_URL` is set and
//! are skipped otherwise. Every test creates its own company, so they can
//! share one database.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use shared::{AuditAction, InvoiceStatus, PaymentMethod, PurchaseOrderStatus, QuoteStatus, StockAction, TenantContext};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashSet;
use std::str::FromStr;
use stockroom_backend::config::SalesConfig;
use stockroom_backend::services::audit::AuditFilter;
use stockroom_backend::services::catalog::{CategoryInput, ProductFilter, UpdateProductInput};
use stockroom_backend::services::invoice::CreateInvoiceInput;
use stockroom_backend::services::line_items::LineItemInput;
use stockroom_backend::services::payment::RecordPaymentInput;
use stockroom_backend::services::purchasing::{CreatePurchaseOrderInput, ReceiptInput, ReceiveItemsInput};
use stockroom_backend::services::quote::CreateQuoteInput;
use stockroom_backend::services::stock::{self, AdjustStockInput, DocumentRef, StockLine, TransferStockInput};
use stockroom_backend::services::{
    AuditService, CatalogService, InvoiceService, PaymentService, PurchasingService, QuoteService, RetryPolicy,
    StockService,
};
use stockroom_backend::AppError;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Fixture {
    db: PgPool,
    tenant: TenantContext,
    product_id: Uuid,
    location_a: Uuid,
    location_b: Uuid,
    client_id: Uuid,
}

/// Connect, migrate and seed a fresh company; `None` when no database is configured
async fn fixture() -> Option<Fixture> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations").run(&db).await.expect("run migrations");

    let company_id: Uuid = sqlx::query_scalar("INSERT INTO companies (name) VALUES ($1) RETURNING id")
        .bind(format!("Test Co {}", Uuid::new_v4()))
        .fetch_one(&db)
        .await
        .unwrap();

    let mut locations = Vec::new();
    for name in ["Warehouse A", "Warehouse B"] {
        let id: Uuid = sqlx::query_scalar("INSERT INTO locations (company_id, name) VALUES ($1, $2) RETURNING id")
            .bind(company_id)
            .bind(name)
            .fetch_one(&db)
            .await
            .unwrap();
        locations.push(id);
    }

    let product_id: Uuid = sqlx::query_scalar(
        "INSERT INTO products (company_id, name, sku, price, purchase_price) VALUES ($1, 'Widget', 'WID-001', 100, 60) RETURNING id",
    )
    .bind(company_id)
    .fetch_one(&db)
    .await
    .unwrap();

    let client_id: Uuid = sqlx::query_scalar("INSERT INTO clients (company_id, name) VALUES ($1, 'Acme') RETURNING id")
        .bind(company_id)
        .fetch_one(&db)
        .await
        .unwrap();

    Some(Fixture {
        db,
        tenant: TenantContext::new(company_id, Uuid::new_v4()),
        product_id,
        location_a: locations[0],
        location_b: locations[1],
        client_id,
    })
}

fn adjust(f: &Fixture, location_id: Uuid, action: StockAction, quantity: i32) -> AdjustStockInput {
    AdjustStockInput {
        product_id: f.product_id,
        location_id,
        action,
        quantity,
        reason: "test".to_string(),
    }
}

fn widgets(f: &Fixture, quantity: i32) -> Vec<LineItemInput> {
    vec![LineItemInput {
        product_id: f.product_id,
        quantity,
        unit_price: None,
        discount_type: Default::default(),
        discount_value: Decimal::ZERO,
    }]
}

fn payment(amount: &str) -> RecordPaymentInput {
    RecordPaymentInput {
        amount: dec(amount),
        payment_date: None,
        method: PaymentMethod::BankTransfer,
        reference: None,
        notes: None,
    }
}

/// An issued invoice for three widgets at 100.00, no tax
async fn issued_invoice(f: &Fixture) -> Uuid {
    let service = InvoiceService::new(f.db.clone(), RetryPolicy::default(), SalesConfig::default());
    let detail = service
        .create_invoice(
            &f.tenant,
            CreateInvoiceInput {
                client_id: f.client_id,
                issue_date: None,
                due_date: None,
                tax_rate: Some(Decimal::ZERO),
                notes: None,
                terms: None,
                line_items: widgets(f, 3),
                issue: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(detail.invoice.total_amount, dec("300.00"));
    assert_eq!(detail.invoice.status, InvoiceStatus::Unpaid);
    detail.invoice.id
}

// ============================================================================
// Stock ledger
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_more_than_on_hand_leaves_row_untouched() {
    let Some(f) = fixture().await else { return };
    let stock = StockService::new(f.db.clone());

    stock.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 10)).await.unwrap();
    stock.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Remove, 4)).await.unwrap();

    let err = stock
        .adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Remove, 10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            available: 6,
            requested: 10
        }
    ));
    assert_eq!(stock.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transfer_moves_everything() {
    let Some(f) = fixture().await else { return };
    let stock = StockService::new(f.db.clone());

    stock.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 5)).await.unwrap();
    let result = stock
        .transfer(
            &f.tenant,
            TransferStockInput {
                product_id: f.product_id,
                from_location_id: f.location_a,
                to_location_id: f.location_b,
                quantity: 5,
                reason: "rebalance".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.source.quantity, 0);
    assert_eq!(result.destination.quantity, 5);
}

/// Other tenants cannot see or touch this company's stock
#[tokio::test(flavor = "multi_thread")]
async fn test_foreign_tenant_is_rejected() {
    let Some(f) = fixture().await else { return };
    let stock = StockService::new(f.db.clone());
    let stranger = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());

    let err = stock
        .adjust(&stranger, adjust(&f, f.location_a, StockAction::Add, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidReference(_)));
}

// ============================================================================
// Payments
// ============================================================================

/// Pay 300 of 300, then one cent more
#[tokio::test(flavor = "multi_thread")]
async fn test_full_payment_reduces_stock_then_rejects_overpayment() {
    let Some(f) = fixture().await else { return };
    let stock = StockService::new(f.db.clone());
    stock.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 10)).await.unwrap();

    let invoice_id = issued_invoice(&f).await;
    let payments = PaymentService::new(f.db.clone(), RetryPolicy::default(), SalesConfig::default());

    let outcome = payments.record_payment(&f.tenant, invoice_id, payment("300.00")).await.unwrap();
    assert_eq!(outcome.invoice.invoice.status, InvoiceStatus::Paid);
    assert!(outcome.invoice.invoice.paid_date.is_some());
    assert!(outcome.invoice.invoice.stock_reduced);
    assert!(outcome.stock_reductions.is_some());
    assert_eq!(stock.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 7);

    let err = payments
        .record_payment(&f.tenant, invoice_id, payment("0.01"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentExceedsOutstanding { .. }));
}

/// Two payments that each settle the whole balance race; one wins and the
/// stock leaves exactly once
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_settlements_reduce_stock_once() {
    let Some(f) = fixture().await else { return };
    let stock = StockService::new(f.db.clone());
    stock.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 10)).await.unwrap();

    let invoice_id = issued_invoice(&f).await;
    let payments = PaymentService::new(f.db.clone(), RetryPolicy::default(), SalesConfig::default());

    let (first, second) = tokio::join!(
        payments.record_payment(&f.tenant, invoice_id, payment("300.00")),
        payments.record_payment(&f.tenant, invoice_id, payment("300.00")),
    );

    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    for result in [first, second] {
        if let Err(err) = result {
            assert!(matches!(err, AppError::PaymentExceedsOutstanding { .. }));
        }
    }
    assert_eq!(stock.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 7);
}

/// An order that cannot be fully served drains every location and records
/// the gap instead of failing
#[tokio::test(flavor = "multi_thread")]
async fn test_bulk_reduce_shortfall_drains_to_zero() {
    let Some(f) = fixture().await else { return };
    let stock_service = StockService::new(f.db.clone());
    stock_service.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 4)).await.unwrap();
    stock_service.adjust(&f.tenant, adjust(&f, f.location_b, StockAction::Add, 6)).await.unwrap();

    let mut tx = f.db.begin().await.unwrap();
    let report = stock::bulk_reduce(
        &mut *tx,
        &f.tenant,
        &[StockLine {
            product_id: f.product_id,
            quantity: 15,
        }],
        &DocumentRef {
            kind: "invoice",
            id: Uuid::new_v4(),
            number: "INV-99999".to_string(),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].requested, 15);
    assert_eq!(report[0].taken, 10);
    assert_eq!(report[0].shortfall, 5);
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 0);
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_b).await.unwrap(), 0);

    let shortfalls = AuditService::new(f.db.clone())
        .list_entries(
            &f.tenant,
            AuditFilter {
                action: Some(AuditAction::StockShortfall),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(shortfalls.len(), 1);
}

// ============================================================================
// Invoice status
// ============================================================================

/// Total 300, due yesterday: UNPAID when created, OVERDUE after the sweep
#[tokio::test(flavor = "multi_thread")]
async fn test_past_due_invoice_created_unpaid_then_swept_overdue() {
    let Some(f) = fixture().await else { return };
    let service = InvoiceService::new(f.db.clone(), RetryPolicy::default(), SalesConfig::default());
    let today = Utc::now().date_naive();

    let detail = service
        .create_invoice(
            &f.tenant,
            CreateInvoiceInput {
                client_id: f.client_id,
                issue_date: Some(today - Duration::days(30)),
                due_date: Some(today - Duration::days(1)),
                tax_rate: Some(Decimal::ZERO),
                notes: None,
                terms: None,
                line_items: widgets(&f, 3),
                issue: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(detail.invoice.total_amount, dec("300.00"));
    assert_eq!(detail.invoice.status, InvoiceStatus::Unpaid);

    let sweep = service.refresh_overdue(&f.tenant, today).await.unwrap();
    assert_eq!(sweep.examined, 1);
    assert_eq!(sweep.updated, vec![detail.invoice.invoice_number.clone()]);
    assert!(sweep.failed.is_empty());

    let after = service.get_invoice(&f.tenant, detail.invoice.id).await.unwrap();
    assert_eq!(after.invoice.status, InvoiceStatus::Overdue);
}

// ============================================================================
// Conversion
// ============================================================================

/// Stock leaves on conversion; paying the invoice later takes nothing more
#[tokio::test(flavor = "multi_thread")]
async fn test_conversion_reduces_stock_once_then_payment_does_not() {
    let Some(f) = fixture().await else { return };
    let stock_service = StockService::new(f.db.clone());
    stock_service.adjust(&f.tenant, adjust(&f, f.location_a, StockAction::Add, 10)).await.unwrap();

    let quotes = QuoteService::new(f.db.clone(), RetryPolicy::default());
    let quote = quotes
        .create_quote(
            &f.tenant,
            CreateQuoteInput {
                client_id: f.client_id,
                issue_date: None,
                expiration_date: None,
                tax_rate: Some(Decimal::ZERO),
                notes: None,
                terms: None,
                line_items: widgets(&f, 3),
            },
        )
        .await
        .unwrap();
    let quote_id = quote.quote.id;
    quotes.send_quote(&f.tenant, quote_id).await.unwrap();
    quotes.accept_quote(&f.tenant, quote_id).await.unwrap();

    let payments = PaymentService::new(f.db.clone(), RetryPolicy::default(), SalesConfig::default());
    let converted = payments.convert_quote(&f.tenant, quote_id).await.unwrap();
    assert_eq!(converted.invoice.invoice.status, InvoiceStatus::Unpaid);
    assert!(converted.invoice.invoice.stock_reduced);
    assert!(converted.stock_reductions.is_some());
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 7);

    let quote = quotes.get_quote(&f.tenant, quote_id).await.unwrap();
    assert_eq!(quote.quote.status, QuoteStatus::Invoiced);

    let settled = payments
        .record_payment(&f.tenant, converted.invoice.invoice.id, payment("300.00"))
        .await
        .unwrap();
    assert_eq!(settled.invoice.invoice.status, InvoiceStatus::Paid);
    assert!(settled.stock_reductions.is_none());
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_a).await.unwrap(), 7);

    let err = payments.convert_quote(&f.tenant, quote_id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyConverted));
}

// ============================================================================
// Purchase receiving
// ============================================================================

/// Ordered 10, received 4 then 10, shelved once
#[tokio::test(flavor = "multi_thread")]
async fn test_receive_then_add_stock_once() {
    let Some(f) = fixture().await else { return };
    let supplier_id: Uuid =
        sqlx::query_scalar("INSERT INTO suppliers (company_id, name) VALUES ($1, 'Parts Inc') RETURNING id")
            .bind(f.tenant.company_id)
            .fetch_one(&f.db)
            .await
            .unwrap();

    let purchasing = PurchasingService::new(f.db.clone(), RetryPolicy::default());
    let po = purchasing
        .create_purchase_order(
            &f.tenant,
            CreatePurchaseOrderInput {
                supplier_id,
                receiving_location_id: f.location_b,
                order_date: None,
                expected_delivery_date: None,
                tax_rate: Decimal::ZERO,
                shipping_cost: Decimal::ZERO,
                notes: None,
                terms: None,
                line_items: widgets(&f, 10),
            },
        )
        .await
        .unwrap();
    let po_id = po.purchase_order.id;
    let line_id = po.line_items[0].id;
    assert_eq!(po.purchase_order.total_amount, dec("600.00"));

    purchasing.send_purchase_order(&f.tenant, po_id).await.unwrap();
    purchasing.confirm_purchase_order(&f.tenant, po_id).await.unwrap();

    let receive = |quantity| ReceiveItemsInput {
        items: vec![ReceiptInput {
            line_item_id: line_id,
            quantity_received: quantity,
        }],
    };

    let early = purchasing.add_stock_to_inventory(&f.tenant, po_id).await.unwrap_err();
    assert!(matches!(early, AppError::NotYetReceived));

    let partial = purchasing.receive_line_items(&f.tenant, po_id, receive(4)).await.unwrap();
    assert_eq!(partial.purchase_order.status, PurchaseOrderStatus::PartiallyReceived);

    let full = purchasing.receive_line_items(&f.tenant, po_id, receive(10)).await.unwrap();
    assert_eq!(full.purchase_order.status, PurchaseOrderStatus::Received);
    assert!(full.purchase_order.received_date.is_some());

    let added = purchasing.add_stock_to_inventory(&f.tenant, po_id).await.unwrap();
    assert!(added.purchase_order.stock_added);
    let stock_service = StockService::new(f.db.clone());
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_b).await.unwrap(), 10);

    let again = purchasing.add_stock_to_inventory(&f.tenant, po_id).await.unwrap_err();
    assert!(matches!(again, AppError::AlreadyAdded));
    assert_eq!(stock_service.quantity(&f.tenant, f.product_id, f.location_b).await.unwrap(), 10);

    let late = purchasing.receive_line_items(&f.tenant, po_id, receive(12)).await.unwrap_err();
    assert!(matches!(late, AppError::AlreadyReceived));
}

// ============================================================================
// Catalog
// ============================================================================

/// Categories named in an import are created once and reused
#[tokio::test(flavor = "multi_thread")]
async fn test_import_creates_categories_once() {
    let Some(f) = fixture().await else { return };
    let catalog = CatalogService::new(f.db.clone());

    let csv = "name,sku,category,price\n\
               Bolt,BLT-1,Hardware,0.50\n\
               Nut,NUT-1,Hardware,0.20\n\
               Glue,GLU-1,Supplies,3.00\n\
               Tape,TAP-1,,1.00\n";
    let report = catalog.import_products(&f.tenant, csv).await.unwrap();
    assert_eq!(report.created, 4);
    assert_eq!(report.categories_created, 2);
    assert!(report.errors.is_empty());

    let categories = catalog.list_categories(&f.tenant).await.unwrap();
    let hardware = categories.iter().find(|c| c.name == "Hardware").unwrap();
    assert_eq!(hardware.product_count, 2);

    let filed = catalog
        .list_products(
            &f.tenant,
            ProductFilter {
                search: None,
                category_id: Some(hardware.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(filed.len(), 2);

    let second = catalog
        .import_products(&f.tenant, "name,sku,category\nWasher,WSH-1,Hardware\n")
        .await
        .unwrap();
    assert_eq!(second.categories_created, 0);

    let err = catalog.delete_category(&f.tenant, hardware.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

/// A product can only be filed under its own company's categories
#[tokio::test(flavor = "multi_thread")]
async fn test_foreign_category_is_rejected() {
    let Some(f) = fixture().await else { return };
    let catalog = CatalogService::new(f.db.clone());
    let other = fixture().await.unwrap();
    let foreign = CatalogService::new(other.db.clone())
        .create_category(&other.tenant, CategoryInput { name: "Elsewhere".to_string() })
        .await
        .unwrap();

    let err = catalog
        .update_product(
            &f.tenant,
            f.product_id,
            UpdateProductInput {
                category_id: Some(foreign.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidReference(_)));
}

/// Audit rows keep their company: deleting it is refused by the foreign key
#[tokio::test(flavor = "multi_thread")]
async fn test_company_with_audit_history_cannot_be_deleted() {
    let Some(f) = fixture().await else { return };
    CatalogService::new(f.db.clone())
        .create_category(&f.tenant, CategoryInput { name: "Audited".to_string() })
        .await
        .unwrap();

    let err = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(f.tenant.company_id)
        .execute(&f.db)
        .await
        .unwrap_err();
    let code = err.as_database_error().and_then(|e| e.code()).map(|c| c.into_owned());
    assert_eq!(code.as_deref(), Some("23503"));
}

// ============================================================================
// Numbering
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_quotes_get_distinct_numbers() {
    let Some(f) = fixture().await else { return };
    let quotes = QuoteService::new(f.db.clone(), RetryPolicy::default());

    let mut handles = Vec::new();
    for _ in 0..50 {
        let quotes = quotes.clone();
        let tenant = f.tenant;
        let client_id = f.client_id;
        handles.push(tokio::spawn(async move {
            quotes
                .create_quote(
                    &tenant,
                    CreateQuoteInput {
                        client_id,
                        issue_date: None,
                        expiration_date: None,
                        tax_rate: None,
                        notes: None,
                        terms: None,
                        line_items: Vec::new(),
                    },
                )
                .await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let detail = handle.await.unwrap().unwrap();
        assert!(numbers.insert(detail.quote.quote_number));
    }

    let expected: HashSet<String> = (1..=50).map(|n| format!("QT-{:05}", n)).collect();
    assert_eq!(numbers, expected);
}
