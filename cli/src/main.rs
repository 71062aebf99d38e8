use std::fs;
use std::io::{self, Read, Write};

use backoffice::board::{BoardAction, DragLocation, OrderBoard};
use backoffice::draft::OrderDraft;
use backoffice::inventory::{FormError, Inventory, ProductColumn, ProductForm, ProductId};
use backoffice::notify::NotificationFeed;
use backoffice::orders::{Order, OrderStatus};
use backoffice::seed;
use backoffice::stores::StorePicker;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid --now value: {0} (expected RFC 3339, like 2025-02-12T12:00:00Z)")]
    InvalidNow(String),
    #[error("unknown status: {0} (expected new, preparing, ready, delivered, or cancelled)")]
    UnknownStatus(String),
    #[error("unknown sort column: {0}")]
    UnknownColumn(String),
    #[error("order {0} is not on the board")]
    UnknownOrder(String),
    #[error("product {0} is not in the inventory")]
    UnknownProduct(ProductId),
    #[error("store {0} is not in the directory")]
    UnknownStore(String),
    #[error("menu item {0} is not in the catalog")]
    UnknownMenuItem(String),
    #[error("invalid product form: {0}")]
    Form(#[from] FormError),
    #[error("csv import failed: {0}")]
    Csv(#[from] backoffice::csv::CsvError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gourmet", about = "Restaurant back-office demo CLI over seeded state")]
struct Cli {
    #[arg(long, env = "GOURMET_NOW", help = "Clock override, RFC 3339")]
    now: Option<String>,

    #[arg(long, env = "GOURMET_JSON", default_value_t = false)]
    json: bool,

    #[arg(long, default_value_t = false, help = "Skip confirmation prompts")]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    now: OffsetDateTime,
    json: bool,
    yes: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    Board(BoardCommand),
    Inventory(InventoryCommand),
    Order(OrderCommand),
    Stores(StoresCommand),
    Notices(NoticesCommand),
}

#[derive(Args, Debug)]
struct BoardCommand {
    #[command(subcommand)]
    command: BoardSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardSubcommand {
    Show {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "")]
        query: String,
    },
    Move {
        order_id: String,
        status: String,
        #[arg(long, help = "Visible position in the destination column; defaults to the end")]
        index: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct InventoryCommand {
    #[command(subcommand)]
    command: InventorySubcommand,
}

#[derive(Subcommand, Debug)]
enum InventorySubcommand {
    List(ListArgs),
    Summary,
    Add(AddArgs),
    Edit(EditArgs),
    Delete {
        #[arg(required = true)]
        ids: Vec<ProductId>,
    },
    Export,
    Import {
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value = "")]
    query: String,

    #[arg(long, default_value = "")]
    category: String,

    #[arg(long, default_value = "")]
    supplier: String,

    #[arg(long, default_value = "")]
    stock_min: String,

    #[arg(long, default_value = "")]
    stock_max: String,

    #[arg(long)]
    sort: Option<String>,

    #[arg(long, default_value_t = false)]
    desc: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    category: String,

    #[arg(long)]
    stock: String,

    #[arg(long)]
    price: String,

    #[arg(long)]
    supplier: String,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: ProductId,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    stock: Option<String>,

    #[arg(long)]
    price: Option<String>,

    #[arg(long)]
    supplier: Option<String>,
}

#[derive(Args, Debug)]
struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrderSubcommand {
    Menu {
        #[arg(long, default_value = "")]
        query: String,
    },
    Draft(DraftArgs),
}

#[derive(Args, Debug)]
struct DraftArgs {
    #[arg(long = "add", required = true, help = "Menu item id to add; repeat to add more")]
    add: Vec<String>,

    #[arg(long, default_value = "")]
    customer: String,

    #[arg(long, default_value = "")]
    table: String,

    #[arg(long, default_value = "")]
    notes: String,
}

#[derive(Args, Debug)]
struct StoresCommand {
    #[command(subcommand)]
    command: StoresSubcommand,
}

#[derive(Subcommand, Debug)]
enum StoresSubcommand {
    List {
        #[arg(long, default_value = "")]
        query: String,
    },
    Select {
        id: String,
    },
}

#[derive(Args, Debug)]
struct NoticesCommand {
    #[command(subcommand)]
    command: NoticesSubcommand,
}

#[derive(Subcommand, Debug)]
enum NoticesSubcommand {
    List,
    Read {
        id: String,
    },
    ReadAll,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let now = match &cli.now {
        Some(raw) => {
            OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| CliError::InvalidNow(raw.clone()))?
        }
        None => OffsetDateTime::now_utc(),
    };
    let ctx = CliContext { now, json: cli.json, yes: cli.yes };

    match cli.command {
        Command::Board(board) => run_board(&ctx, board),
        Command::Inventory(inventory) => run_inventory(&ctx, inventory),
        Command::Order(order) => run_order(&ctx, order),
        Command::Stores(stores) => run_stores(&ctx, stores),
        Command::Notices(notices) => run_notices(&ctx, notices),
    }
}

fn run_board(ctx: &CliContext, board: BoardCommand) -> Result<(), CliError> {
    let mut state = OrderBoard::new();
    state.load(seed::sample_orders(ctx.now));

    match board.command {
        BoardSubcommand::Show { status, query } => {
            if let Some(raw) = status {
                state.set_status_filter(Some(parse_status(&raw)?));
            }
            state.set_query(query);
            print_board(ctx, &state)
        }
        BoardSubcommand::Move { order_id, status, index } => {
            let status = parse_status(&status)?;
            let index = index.unwrap_or_else(|| state.column(status).len());
            match state.drag_end(&order_id, Some(DragLocation { status, index })) {
                BoardAction::Moved { to, .. } => {
                    println!("Pedido actualizado");
                    println!("El pedido ha sido movido a {}", to.as_str());
                }
                BoardAction::None => return Err(CliError::UnknownOrder(order_id)),
            }
            print_board(ctx, &state)
        }
    }
}

fn run_inventory(ctx: &CliContext, inventory: InventoryCommand) -> Result<(), CliError> {
    let mut state = Inventory::new();
    state.load(seed::sample_products());

    match inventory.command {
        InventorySubcommand::List(args) => {
            state.set_query(args.query);
            state.set_category_filter(args.category);
            state.set_supplier_filter(args.supplier);
            state.set_stock_min(args.stock_min);
            state.set_stock_max(args.stock_max);
            if let Some(raw) = args.sort {
                let Some(column) = ProductColumn::parse(&raw) else {
                    return Err(CliError::UnknownColumn(raw));
                };
                state.toggle_sort(column);
                if args.desc {
                    state.toggle_sort(column);
                }
            }
            print_products(ctx, &state)
        }
        InventorySubcommand::Summary => {
            let summary = state.summary();
            if ctx.json {
                let value = serde_json::json!({
                    "summary": summary,
                    "value_by_category": state.value_by_category(),
                });
                return print_json(&value);
            }
            println!("products: {}", summary.total_products);
            println!("low stock: {}", summary.low_stock_count);
            println!("total value: ${:.2}", summary.total_value);
            for (category, value) in state.value_by_category() {
                println!("  {category}: ${value:.2}");
            }
            Ok(())
        }
        InventorySubcommand::Add(args) => {
            let form = ProductForm {
                name: args.name,
                category: args.category,
                stock: args.stock,
                unit_price: args.price,
                supplier: args.supplier,
            };
            let id = state.save_product(&form, None, ctx.now)?;
            println!("added product {id}");
            print_activity(&state);
            Ok(())
        }
        InventorySubcommand::Edit(args) => {
            let Some(existing) = state.get(args.id) else {
                return Err(CliError::UnknownProduct(args.id));
            };
            let mut form = ProductForm::from_product(existing);
            if let Some(name) = args.name {
                form.name = name;
            }
            if let Some(category) = args.category {
                form.category = category;
            }
            if let Some(stock) = args.stock {
                form.stock = stock;
            }
            if let Some(price) = args.price {
                form.unit_price = price;
            }
            if let Some(supplier) = args.supplier {
                form.supplier = supplier;
            }
            state.save_product(&form, Some(args.id), ctx.now)?;
            println!("updated product {}", args.id);
            print_activity(&state);
            Ok(())
        }
        InventorySubcommand::Delete { ids } => {
            for id in &ids {
                if state.get(*id).is_none() {
                    return Err(CliError::UnknownProduct(*id));
                }
            }
            let noun = if ids.len() == 1 { "product" } else { "products" };
            if !confirm(&format!("delete {} {noun}?", ids.len()), ctx.yes)? {
                println!("aborted");
                return Ok(());
            }
            if let [id] = ids.as_slice() {
                state.delete(*id, ctx.now);
            } else {
                for id in &ids {
                    state.toggle_selected(*id);
                }
                state.batch_delete(ctx.now);
            }
            println!("deleted {} {noun}", ids.len());
            print_activity(&state);
            Ok(())
        }
        InventorySubcommand::Export => {
            print!("{}", state.export_csv(ctx.now));
            Ok(())
        }
        InventorySubcommand::Import { input } => {
            let text = read_input(&input)?;
            let count = state.import_csv(&text, ctx.now)?;
            println!("imported {count} products");
            print_activity(&state);
            Ok(())
        }
    }
}

fn run_order(ctx: &CliContext, order: OrderCommand) -> Result<(), CliError> {
    let mut draft = OrderDraft::new(seed::sample_catalog());

    match order.command {
        OrderSubcommand::Menu { query } => {
            draft.set_query(query);
            if ctx.json {
                return print_json(&serde_json::to_value(draft.filtered_catalog())?);
            }
            for item in draft.filtered_catalog() {
                println!("{:>3}  {:<24}${:>6.2}  {}", item.id, item.name, item.price, item.category);
            }
            Ok(())
        }
        OrderSubcommand::Draft(args) => {
            draft.open();
            draft.set_customer_name(args.customer);
            draft.set_table_number(args.table);
            draft.set_notes(args.notes);
            for id in &args.add {
                if !draft.add_item(id) {
                    return Err(CliError::UnknownMenuItem(id.clone()));
                }
            }
            if ctx.json {
                let value = serde_json::json!({
                    "customer": draft.customer_name(),
                    "table": draft.table_number(),
                    "notes": draft.notes(),
                    "items": draft.items(),
                    "total": draft.total(),
                });
                print_json(&value)?;
            } else {
                for line in draft.items() {
                    println!("{:>2} x {:<24}${:>6.2}", line.quantity, line.item.name, line.subtotal());
                }
                println!("Total: ${:.2}", draft.total());
            }
            draft.confirm();
            if !ctx.json {
                println!("draft confirmed; cart cleared without touching the board");
            }
            Ok(())
        }
    }
}

fn run_stores(ctx: &CliContext, stores: StoresCommand) -> Result<(), CliError> {
    let mut picker = StorePicker::new(seed::sample_stores());

    match stores.command {
        StoresSubcommand::List { query } => {
            if ctx.json {
                return print_json(&serde_json::to_value(picker.search(&query))?);
            }
            for store in picker.search(&query) {
                let marker = if picker
                    .selected_store()
                    .is_some_and(|selected| selected.id == store.id)
                {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:>2}  {:<18}{:<24}{}",
                    store.id,
                    store.name,
                    store.address,
                    store.status.as_str()
                );
            }
            Ok(())
        }
        StoresSubcommand::Select { id } => {
            if !picker.select(&id) {
                return Err(CliError::UnknownStore(id));
            }
            if ctx.json {
                let value = serde_json::json!({
                    "selected": picker.selected_store(),
                    "recents": picker.recents(),
                });
                return print_json(&value);
            }
            println!("selected: {}", picker.selection_label());
            let recents: Vec<&str> =
                picker.recents().iter().map(|store| store.name.as_str()).collect();
            println!("recents: {}", recents.join(", "));
            Ok(())
        }
    }
}

fn run_notices(ctx: &CliContext, notices: NoticesCommand) -> Result<(), CliError> {
    let mut feed = NotificationFeed::new();
    feed.load(seed::sample_notifications(ctx.now));

    match notices.command {
        NoticesSubcommand::List => print_feed(ctx, &feed),
        NoticesSubcommand::Read { id } => {
            if !feed.mark_read(&id) && !ctx.json {
                println!("nothing to mark");
            }
            print_feed(ctx, &feed)
        }
        NoticesSubcommand::ReadAll => {
            let flipped = feed.mark_all_read();
            if !ctx.json {
                println!("marked {flipped} notifications read");
            }
            print_feed(ctx, &feed)
        }
    }
}

fn print_board(ctx: &CliContext, board: &OrderBoard) -> Result<(), CliError> {
    if ctx.json {
        return print_json(&serde_json::to_value(board.visible())?);
    }
    for (status, count) in board.column_counts() {
        println!("{} ({count})", status_title(status));
        for order in board.column(status) {
            println!("  {}", order_line(order, ctx.now));
        }
    }
    Ok(())
}

fn status_title(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::New => "Nuevos",
        OrderStatus::Preparing => "En Preparación",
        OrderStatus::Ready => "Listos",
        OrderStatus::Delivered => "Entregados",
        OrderStatus::Cancelled => "Cancelados",
    }
}

fn order_line(order: &Order, now: OffsetDateTime) -> String {
    let mut line = format!(
        "#{} {} · ${:.2} · {} min",
        order.id,
        order.customer_name,
        order.total,
        order.age(now).whole_minutes()
    );
    if let Some(table) = &order.table_number {
        line.push_str(&format!(" · mesa {table}"));
    }
    if let Some(platform) = order.delivery_platform {
        line.push_str(&format!(" · {}", platform.label()));
    }
    if let Some(payment) = order.payment_method {
        line.push_str(&format!(" · {}", payment.label()));
    }
    if order.is_urgent {
        line.push_str(" · URGENTE");
    }
    if order.is_delayed(now) {
        line.push_str(" · DEMORADO");
    }
    line
}

fn print_products(ctx: &CliContext, inventory: &Inventory) -> Result<(), CliError> {
    if ctx.json {
        return print_json(&serde_json::to_value(inventory.visible())?);
    }
    let rows = inventory.visible();
    println!(
        "{:>4}  {:<24}{:<16}{:>6}  {:>8}  {:<16}{}",
        "id", "name", "category", "stock", "price", "supplier", "updated"
    );
    for product in &rows {
        let marker = if product.is_low_stock() { "  *" } else { "" };
        println!(
            "{:>4}  {:<24}{:<16}{:>6}  {:>8.2}  {:<16}{}{marker}",
            product.id,
            product.name,
            product.category,
            product.stock,
            product.unit_price,
            product.supplier,
            product.last_updated
        );
    }
    if rows.iter().any(|product| product.is_low_stock()) {
        println!("(* low stock)");
    }
    Ok(())
}

fn print_activity(inventory: &Inventory) {
    if let Some(entry) = inventory.log().first() {
        println!("activity: {}", entry.message);
    }
}

fn print_feed(ctx: &CliContext, feed: &NotificationFeed) -> Result<(), CliError> {
    if ctx.json {
        let value = serde_json::json!({
            "unread": feed.unread_count(),
            "notifications": feed.notifications(),
        });
        return print_json(&value);
    }
    println!("unread: {}", feed.unread_count());
    for notification in feed.notifications() {
        let marker = if notification.read { " " } else { "•" };
        println!(
            "{marker} [{}] {} - {} ({})",
            notification.kind.as_str(),
            notification.title,
            notification.message,
            age_label(notification.age(ctx.now))
        );
    }
    Ok(())
}

fn age_label(age: Duration) -> String {
    let minutes = age.whole_minutes();
    if minutes >= 60 {
        format!("Hace {} h", minutes / 60)
    } else {
        format!("Hace {minutes} min")
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, CliError> {
    let Some(status) = OrderStatus::parse(raw) else {
        return Err(CliError::UnknownStatus(raw.to_owned()));
    };
    Ok(status)
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, CliError> {
    if assume_yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn read_input(path: &str) -> Result<String, CliError> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(fs::read_to_string(path)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
