use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use forgepos_auth::{JwtClaims, Principal, Role};
use forgepos_core::{Money, TenantId, UserId};
use forgepos_infra::Backend;
use forgepos_infra::catalog::NewProduct;
use forgepos_infra::checkout::{CheckoutLine, CheckoutRequest};
use forgepos_products::ProductId;
use forgepos_sales::{PaymentDetails, PaymentMethod};

fn principal(tenant_id: TenantId, role: Role) -> Principal {
    let now = Utc::now();
    Principal::from_claims(&JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles: vec![role],
        name: Some("Bench".to_string()),
        issued_at: now,
        expires_at: now + Duration::hours(1),
    })
}

async fn seed(backend: &Backend, manager: &Principal, lines: usize) -> Vec<ProductId> {
    let mut ids = Vec::with_capacity(lines);
    for i in 0..lines {
        let product = backend
            .catalog
            .create_product(
                manager,
                NewProduct {
                    sku: format!("SKU-{i}"),
                    name: format!("Product {i}"),
                    price: Money::new(199),
                    cost: Money::new(99),
                    initial_stock: 1_000_000,
                    low_stock_threshold: 0,
                    category_id: None,
                },
            )
            .await
            .expect("seed product");
        ids.push(product.product_id);
    }
    ids
}

fn request(products: &[ProductId]) -> CheckoutRequest {
    CheckoutRequest {
        items: products
            .iter()
            .map(|&product_id| CheckoutLine {
                product_id,
                quantity: 1,
                discount: Money::ZERO,
            })
            .collect(),
        payment: PaymentDetails {
            method: PaymentMethod::Card,
            amount_paid: None,
            discount: Money::ZERO,
        },
        customer_id: None,
        notes: None,
    }
}

/// Checkout cost grows with the stream length of every product in the cart,
/// since each one is rehydrated per sale.
fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let mut group = c.benchmark_group("checkout");
    for &lines in &[1usize, 5, 20] {
        let backend = Backend::in_memory();
        let tenant_id = TenantId::new();
        let manager = principal(tenant_id, Role::MANAGER);
        let cashier = principal(tenant_id, Role::CASHIER);
        let products = rt.block_on(seed(&backend, &manager, lines));

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("complete_transaction", lines), &products, |b, products| {
            b.iter(|| {
                rt.block_on(backend.checkout.complete_transaction(&cashier, black_box(request(products))))
                    .expect("checkout")
            })
        });
        group.bench_with_input(BenchmarkId::new("quote", lines), &products, |b, products| {
            b.iter(|| {
                rt.block_on(backend.checkout.quote(&cashier, black_box(request(products))))
                    .expect("quote")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_checkout);
criterion_main!(benches);
