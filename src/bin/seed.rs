use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", "admin").await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "Demo Seller", "seller").await?;
    let user_id = ensure_user(&pool, "user@example.com", "Demo Buyer", "user").await?;
    seed_products(&pool, seller_id).await?;

    println!("Seed completed. Admin: {admin_id}, Seller: {seller_id}, Buyer: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    display_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, display_name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(display_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(row.0)
}

async fn seed_products(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Walnut Desk Organizer", "Handmade walnut tray", "home", 550000, 50),
        ("Ceramic Pour-Over Set", "Stoneware dripper and carafe", "kitchen", 120000, 100),
        ("Linen Tote Bag", "Natural linen, reinforced seams", "fashion", 50000, 200),
        ("Field Notebook 3-Pack", "Dot grid, 48 pages each", "stationery", 25000, 75),
    ];

    for (name, desc, category, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, category, tags, price, stock)
            VALUES ($1, $2, $3, $4, $5, '[]'::jsonb, $6, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(desc)
        .bind(category)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
