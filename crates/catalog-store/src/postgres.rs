use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::{
    Author, AuthorDraft, AuthorId, AuthorSearch, Customer, CustomerDraft, CustomerId,
    CustomerSearch, Item, ItemDraft, ItemId, ItemSearch, Money, NewOrder, Order, OrderId,
    OrderLine, OrderSearch, OrderStatus, Result, StockChange, StoreError, Tag, order_total,
    query::{like_pattern, text_filter},
    store::{CatalogStore, non_empty},
};

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.title, i.published_at, i.price_cents, i.quantity,
           a.id AS author_id, a.first_name, a.last_name, a.bio,
           COALESCE(
               ARRAY_AGG(t.name::TEXT ORDER BY t.name) FILTER (WHERE t.id IS NOT NULL),
               ARRAY[]::TEXT[]
           ) AS tags
    FROM items i
    JOIN authors a ON a.id = i.author_id
    LEFT JOIN item_tags it ON it.item_id = i.id
    LEFT JOIN tags t ON t.id = it.tag_id
    WHERE 1=1"#;

const ITEM_GROUP: &str = " GROUP BY i.id, a.id ORDER BY i.id ASC";

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.status, o.total_cents, o.created_at,
           c.id AS customer_id, c.name, c.email, c.street, c.city, c.state,
           c.postal_code, c.country
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
    WHERE 1=1"#;

const CUSTOMER_COLUMNS: &str = "id, name, email, street, city, state, postal_code, country";

/// Snapshot of an item row locked inside an open transaction.
struct Reserved {
    title: String,
    unit_price: Money,
    remaining: u32,
}

/// PostgreSQL-backed catalog store implementation.
///
/// Stock changes are conditional updates inside a transaction, so two
/// processes sharing the database cannot oversell an item.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_author(row: &PgRow, id_column: &str) -> Result<Author> {
        Ok(Author {
            id: AuthorId::new(row.try_get(id_column)?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            bio: row.try_get("bio")?,
        })
    }

    fn row_to_customer(row: &PgRow, id_column: &str) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::new(row.try_get(id_column)?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postal_code: row.try_get("postal_code")?,
            country: row.try_get("country")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<Item> {
        let tags: Vec<String> = row.try_get("tags")?;
        Ok(Item {
            id: ItemId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            author: Self::row_to_author(row, "author_id")?,
            tags: tags.into_iter().collect(),
            published_at: row.try_get("published_at")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: from_db_quantity(row.try_get("quantity")?)?,
        })
    }

    fn row_to_order_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            item_id: ItemId::new(row.try_get("item_id")?),
            title: row.try_get("title")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: from_db_quantity(row.try_get("quantity")?)?,
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            customer: Self::row_to_customer(row, "customer_id")?,
            status: status.parse()?,
            total: Money::from_cents(row.try_get("total_cents")?),
            created_at: row.try_get("created_at")?,
            lines,
        })
    }

    /// Attaches lines to order header rows with one extra query.
    async fn load_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, item_id, title, unit_price_cents, quantity
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            lines_by_order
                .entry(row.try_get("order_id")?)
                .or_default()
                .push(Self::row_to_order_line(row)?);
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                Self::row_to_order(row, lines_by_order.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn ensure_author(conn: &mut PgConnection, id: AuthorId) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
            .bind(id.as_i64())
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            return Err(StoreError::Invalid(format!("author {id} does not exist")));
        }
        Ok(())
    }

    /// Links tags to an item, creating tag records only for unseen names.
    async fn link_tags(conn: &mut PgConnection, item_id: i64, names: &BTreeSet<String>) -> Result<()> {
        for name in names {
            let tag_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO tags (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

            sqlx::query(
                "INSERT INTO item_tags (item_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(item_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Conditionally takes stock; the row lock is held until the caller's
    /// transaction ends.
    async fn reserve_in(conn: &mut PgConnection, id: ItemId, quantity: u32) -> Result<Reserved> {
        if quantity == 0 {
            return Err(StoreError::Invalid(format!(
                "quantity for item {id} must be at least 1"
            )));
        }
        let requested = to_db_quantity(quantity)?;

        let row = sqlx::query(
            r#"
            UPDATE items SET quantity = quantity - $1
            WHERE id = $2 AND quantity >= $1
            RETURNING title, price_cents, quantity
            "#,
        )
        .bind(requested)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            return Ok(Reserved {
                title: row.try_get("title")?,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
                remaining: from_db_quantity(row.try_get("quantity")?)?,
            });
        }

        let available: Option<i32> = sqlx::query_scalar("SELECT quantity FROM items WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        match available {
            None => Err(StoreError::not_found("item", id)),
            Some(available) => Err(StoreError::InsufficientStock {
                item_id: id,
                requested: quantity,
                available: from_db_quantity(available)?,
            }),
        }
    }

    async fn fetch_customer(conn: &mut PgConnection, id: CustomerId) -> Result<Customer> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("customer", id))?;
        Self::row_to_customer(&row, "id")
    }
}

fn from_db_quantity(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn to_db_quantity(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Invalid(format!("quantity {value} is too large")))
}

/// Maps a foreign-key violation on delete to `Conflict`.
fn referenced(e: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return StoreError::Conflict(message());
    }
    StoreError::Database(e)
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_item(&self, id: ItemId) -> Result<Item> {
        let row = sqlx::query(&format!("{ITEM_SELECT} AND i.id = $1{ITEM_GROUP}"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("item", id))?;
        Self::row_to_item(&row)
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("{ITEM_SELECT}{ITEM_GROUP}"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn search_items(&self, criteria: &ItemSearch) -> Result<Vec<Item>> {
        let mut sql = String::from(ITEM_SELECT);
        let mut param_count = 0;

        // Build dynamic query
        if criteria.title_filter().is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND i.title ILIKE ${param_count}"));
        }
        if criteria.author_first_name_filter().is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND a.first_name ILIKE ${param_count}"));
        }
        if criteria.author_last_name_filter().is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND a.last_name ILIKE ${param_count}"));
        }
        if criteria.min_price_filter().is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND i.price_cents >= ${param_count}"));
        }
        if criteria.max_price_filter().is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND i.price_cents <= ${param_count}"));
        }
        sql.push_str(ITEM_GROUP);

        let mut query = sqlx::query(&sql);
        if let Some(title) = criteria.title_filter() {
            query = query.bind(like_pattern(title));
        }
        if let Some(first) = criteria.author_first_name_filter() {
            query = query.bind(like_pattern(first));
        }
        if let Some(last) = criteria.author_last_name_filter() {
            query = query.bind(like_pattern(last));
        }
        if let Some(min) = criteria.min_price_filter() {
            query = query.bind(min.cents());
        }
        if let Some(max) = criteria.max_price_filter() {
            query = query.bind(max.cents());
        }

        let rows = query.fetch_all(&self.pool).await?;
        let items = rows.iter().map(Self::row_to_item).collect::<Result<Vec<_>>>()?;
        non_empty(items, "items")
    }

    async fn create_item(&self, draft: ItemDraft) -> Result<Item> {
        draft.validate()?;
        let mut tx = self.pool.begin().await?;

        Self::ensure_author(&mut tx, draft.author_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO items (title, author_id, published_at, price_cents, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&draft.title)
        .bind(draft.author_id.as_i64())
        .bind(draft.published_at)
        .bind(draft.price.cents())
        .bind(to_db_quantity(draft.quantity)?)
        .fetch_one(&mut *tx)
        .await?;

        Self::link_tags(&mut tx, id, &draft.tag_names()).await?;

        tx.commit().await?;
        self.get_item(ItemId::new(id)).await
    }

    async fn update_item(&self, id: ItemId, draft: ItemDraft) -> Result<Item> {
        draft.validate()?;
        let mut tx = self.pool.begin().await?;

        Self::ensure_author(&mut tx, draft.author_id).await?;

        let updated = sqlx::query(
            r#"
            UPDATE items
            SET title = $1, author_id = $2, published_at = $3, price_cents = $4, quantity = $5
            WHERE id = $6
            "#,
        )
        .bind(&draft.title)
        .bind(draft.author_id.as_i64())
        .bind(draft.published_at)
        .bind(draft.price.cents())
        .bind(to_db_quantity(draft.quantity)?)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("item", id));
        }

        sqlx::query("DELETE FROM item_tags WHERE item_id = $1")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        Self::link_tags(&mut tx, id.as_i64(), &draft.tag_names()).await?;

        tx.commit().await?;
        self.get_item(id).await
    }

    async fn decrement_or_delete_item(&self, id: ItemId) -> Result<StockChange> {
        let mut tx = self.pool.begin().await?;

        let quantity: i32 =
            sqlx::query_scalar("SELECT quantity FROM items WHERE id = $1 FOR UPDATE")
                .bind(id.as_i64())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::not_found("item", id))?;

        let change = if quantity > 1 {
            let remaining: i32 = sqlx::query_scalar(
                "UPDATE items SET quantity = quantity - 1 WHERE id = $1 RETURNING quantity",
            )
            .bind(id.as_i64())
            .fetch_one(&mut *tx)
            .await?;
            StockChange::Decremented {
                remaining: from_db_quantity(remaining)?,
            }
        } else {
            sqlx::query("DELETE FROM item_tags WHERE item_id = $1")
                .bind(id.as_i64())
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(id.as_i64())
                .execute(&mut *tx)
                .await?;
            StockChange::Removed
        };

        tx.commit().await?;
        Ok(change)
    }

    async fn reserve_stock(&self, id: ItemId, quantity: u32) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let reserved = Self::reserve_in(&mut tx, id, quantity).await?;
        tx.commit().await?;
        Ok(reserved.remaining)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Tag {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn get_author(&self, id: AuthorId) -> Result<Author> {
        let row = sqlx::query("SELECT id, first_name, last_name, bio FROM authors WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("author", id))?;
        Self::row_to_author(&row, "id")
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        let rows = sqlx::query("SELECT id, first_name, last_name, bio FROM authors ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| Self::row_to_author(row, "id")).collect()
    }

    async fn search_authors(&self, criteria: &AuthorSearch) -> Result<Vec<Author>> {
        let first = text_filter(&criteria.first_name);
        let last = text_filter(&criteria.last_name);

        let mut sql = String::from("SELECT id, first_name, last_name, bio FROM authors WHERE 1=1");
        let mut param_count = 0;
        if first.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND first_name ILIKE ${param_count}"));
        }
        if last.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND last_name ILIKE ${param_count}"));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(first) = first {
            query = query.bind(like_pattern(first));
        }
        if let Some(last) = last {
            query = query.bind(like_pattern(last));
        }

        let rows = query.fetch_all(&self.pool).await?;
        let authors = rows
            .iter()
            .map(|row| Self::row_to_author(row, "id"))
            .collect::<Result<Vec<_>>>()?;
        non_empty(authors, "authors")
    }

    async fn create_author(&self, draft: AuthorDraft) -> Result<Author> {
        draft.validate()?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO authors (first_name, last_name, bio) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.bio)
        .fetch_one(&self.pool)
        .await?;
        Ok(draft.into_author(AuthorId::new(id)))
    }

    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author> {
        draft.validate()?;
        let updated = sqlx::query(
            "UPDATE authors SET first_name = $1, last_name = $2, bio = $3 WHERE id = $4",
        )
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.bio)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("author", id));
        }
        Ok(draft.into_author(id))
    }

    async fn delete_author(&self, id: AuthorId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| referenced(e, || format!("author {id} is still referenced by items")))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("author", id));
        }
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_customer(&mut conn, id).await
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| Self::row_to_customer(row, "id")).collect()
    }

    async fn search_customers(&self, criteria: &CustomerSearch) -> Result<Vec<Customer>> {
        let name = text_filter(&criteria.name);
        let email = text_filter(&criteria.email);

        let mut sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE 1=1");
        let mut param_count = 0;
        if name.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND name ILIKE ${param_count}"));
        }
        if email.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND email ILIKE ${param_count}"));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(name) = name {
            query = query.bind(like_pattern(name));
        }
        if let Some(email) = email {
            query = query.bind(like_pattern(email));
        }

        let rows = query.fetch_all(&self.pool).await?;
        let customers = rows
            .iter()
            .map(|row| Self::row_to_customer(row, "id"))
            .collect::<Result<Vec<_>>>()?;
        non_empty(customers, "customers")
    }

    async fn create_customer(&self, draft: CustomerDraft) -> Result<Customer> {
        draft.validate()?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO customers (name, email, street, city, state, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.street)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(&draft.postal_code)
        .bind(&draft.country)
        .fetch_one(&self.pool)
        .await?;
        Ok(draft.into_customer(CustomerId::new(id)))
    }

    async fn update_customer(&self, id: CustomerId, draft: CustomerDraft) -> Result<Customer> {
        draft.validate()?;
        let updated = sqlx::query(
            r#"
            UPDATE customers
            SET name = $1, email = $2, street = $3, city = $4, state = $5,
                postal_code = $6, country = $7
            WHERE id = $8
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.street)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(&draft.postal_code)
        .bind(&draft.country)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found("customer", id));
        }
        Ok(draft.into_customer(id))
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| referenced(e, || format!("customer {id} is still referenced by orders")))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("customer", id));
        }
        Ok(())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        if order.lines.is_empty() {
            return Err(StoreError::Invalid("order has no lines".to_string()));
        }

        // Any early return drops the transaction, which rolls it back.
        let mut tx = self.pool.begin().await?;

        let customer = Self::fetch_customer(&mut tx, order.customer_id).await?;

        // Lock every referenced row in id order so concurrent orders cannot
        // deadlock, then validate in the caller's line order.
        let ids: Vec<i64> = order
            .lines
            .iter()
            .map(|line| line.item_id.as_i64())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = sqlx::query(
            r#"
            SELECT id, title, price_cents, quantity FROM items
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut locked: HashMap<ItemId, Reserved> = HashMap::with_capacity(rows.len());
        for row in &rows {
            locked.insert(
                ItemId::new(row.try_get("id")?),
                Reserved {
                    title: row.try_get("title")?,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                    remaining: from_db_quantity(row.try_get("quantity")?)?,
                },
            );
        }

        let mut claimed: BTreeMap<ItemId, u32> = BTreeMap::new();
        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            if line.quantity == 0 {
                return Err(StoreError::Invalid(format!(
                    "quantity for item {} must be at least 1",
                    line.item_id
                )));
            }
            let stock = locked
                .get_mut(&line.item_id)
                .ok_or_else(|| StoreError::not_found("item", line.item_id))?;
            if stock.remaining < line.quantity {
                return Err(StoreError::InsufficientStock {
                    item_id: line.item_id,
                    requested: line.quantity,
                    available: stock.remaining,
                });
            }
            stock.remaining -= line.quantity;
            *claimed.entry(line.item_id).or_default() += line.quantity;
            lines.push(OrderLine {
                item_id: line.item_id,
                title: stock.title.clone(),
                unit_price: stock.unit_price,
                quantity: line.quantity,
            });
        }

        let computed = order_total(&lines)?;
        if computed != order.declared_total {
            return Err(StoreError::TotalMismatch {
                declared: order.declared_total,
                computed,
            });
        }

        for (item_id, quantity) in claimed {
            let requested = to_db_quantity(quantity)?;
            let updated = sqlx::query(
                "UPDATE items SET quantity = quantity - $1 WHERE id = $2 AND quantity >= $1",
            )
            .bind(requested)
            .bind(item_id.as_i64())
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() != 1 {
                return Err(StoreError::InsufficientStock {
                    item_id,
                    requested: quantity,
                    available: 0,
                });
            }
        }

        // timestamptz holds microseconds.
        let created_at = order.created_at.trunc_subsecs(6);

        let status = OrderStatus::Pending;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (customer_id, total_cents, status, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(order.customer_id.as_i64())
        .bind(computed.cents())
        .bind(status.as_str())
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, item_id, title, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(line.item_id.as_i64())
            .bind(&line.title)
            .bind(line.unit_price.cents())
            .bind(to_db_quantity(line.quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: OrderId::new(id),
            customer,
            status,
            total: computed,
            created_at,
            lines,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!("{ORDER_SELECT} AND o.id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))?;

        let mut orders = self.load_orders(vec![row]).await?;
        orders.pop().ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("{ORDER_SELECT} ORDER BY o.id ASC"))
            .fetch_all(&self.pool)
            .await?;
        self.load_orders(rows).await
    }

    async fn search_orders(&self, criteria: &OrderSearch) -> Result<Vec<Order>> {
        let name = text_filter(&criteria.customer_name);

        let mut sql = String::from(ORDER_SELECT);
        let mut param_count = 0;
        if name.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND c.name ILIKE ${param_count}"));
        }
        if criteria.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND o.status = ${param_count}"));
        }
        sql.push_str(" ORDER BY o.id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(name) = name {
            query = query.bind(like_pattern(name));
        }
        if let Some(status) = criteria.status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        let orders = self.load_orders(rows).await?;
        non_empty(orders, "orders")
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
            .bind(next.as_str())
            .bind(id.as_i64())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(id.as_i64())
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                None => StoreError::not_found("order", id),
                Some(current) => StoreError::Conflict(format!(
                    "order {id} is {current} (expected {expected})"
                )),
            });
        }

        self.get_order(id).await
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{ORDER_SELECT} AND o.created_at >= $1 AND o.created_at < $2 ORDER BY o.created_at ASC, o.id ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        self.load_orders(rows).await
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
