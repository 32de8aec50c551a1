use alinea_core::config::{database_path_from_env_value, default_user_id_from_env_value};
use alinea_core::constants::DASHBOARD_REQUEST_PURPOSE;
use alinea_core::{
    AccessRequestId, CoreConfig, CoreServices, DataType, EmailAddress, EntityId, ItemId,
    NewEntity, NewUser, NonEmptyText, RequestFilter, UserId,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "alinea")]
#[command(about = "Alinea access request CLI")]
struct Cli {
    /// SQLite database file (falls back to ALINEA_DB_PATH, then alinea.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the default clinic and user if they are missing
    Seed,
    /// List all entities
    Entities,
    /// List all users
    Users,
    /// Create an entity
    CreateEntity {
        name: String,
        /// clinic, dentist, hospital, psychologist, therapist or pharmacy
        entity_type: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Create a user
    CreateUser {
        username: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List access requests
    Requests {
        #[arg(long)]
        entity_id: Option<i64>,
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Show one access request
    Request { id: i64 },
    /// Create an access request
    CreateRequest {
        entity_id: i64,
        /// Data types (comma-separated), e.g. personal_info,medical_info
        data_types: String,
        /// Defaults to ALINEA_DEFAULT_USER_ID
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long, default_value = "")]
        purpose: String,
    },
    /// Approve or reject an access request item
    SetStatus {
        item_id: i64,
        /// approved or rejected
        status: String,
    },
    /// Show every document a user holds
    Documents { user_id: i64 },
    /// Store a user's document for one data type
    PutDocument {
        user_id: i64,
        data_type: String,
        /// JSON object
        document: String,
    },
}

fn open_services(db: Option<PathBuf>) -> Result<CoreServices, Box<dyn std::error::Error>> {
    let database_path = db.unwrap_or_else(|| {
        database_path_from_env_value(std::env::var("ALINEA_DB_PATH").ok())
    });
    let cfg = Arc::new(CoreConfig::new(
        database_path,
        default_user_id_from_env_value(std::env::var("ALINEA_DEFAULT_USER_ID").ok())?,
        NonEmptyText::new(DASHBOARD_REQUEST_PURPOSE)?,
    )?);
    Ok(CoreServices::open(cfg)?)
}

fn optional_email(email: Option<String>) -> Result<Option<EmailAddress>, Box<dyn std::error::Error>> {
    Ok(email.map(EmailAddress::parse).transpose()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command given. Run with --help for usage.");
        return Ok(());
    };
    let services = open_services(cli.db)?;

    match command {
        Commands::Seed => {
            let (entity, user) = services.directory.seed_defaults()?;
            println!(
                "Seeded entity {} ({}) and user {} ({})",
                entity.id, entity.name, user.id, user.username
            );
        }
        Commands::Entities => {
            let entities = services.directory.list_entities()?;
            if entities.is_empty() {
                println!("No entities found.");
            }
            for entity in entities {
                println!(
                    "ID: {}, Name: {}, Type: {}",
                    entity.id,
                    entity.name,
                    entity.entity_type.as_str()
                );
            }
        }
        Commands::Users => {
            let users = services.directory.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            }
            for user in users {
                println!(
                    "ID: {}, Username: {}, Name: {} {}",
                    user.id, user.username, user.first_name, user.last_name
                );
            }
        }
        Commands::CreateEntity {
            name,
            entity_type,
            address,
            phone,
            email,
        } => {
            let entity = services.directory.create_entity(NewEntity {
                name: NonEmptyText::new(name)?,
                entity_type: entity_type.parse()?,
                address,
                phone,
                email: optional_email(email)?,
            })?;
            println!("Created entity with ID: {}", entity.id);
        }
        Commands::CreateUser {
            username,
            first_name,
            last_name,
            email,
        } => {
            let user = services.directory.create_user(NewUser {
                username: NonEmptyText::new(username)?,
                first_name,
                last_name,
                email: optional_email(email)?,
                phone_number: String::new(),
            })?;
            println!("Created user with ID: {}", user.id);
        }
        Commands::Requests { entity_id, user_id } => {
            let requests = services.access.list_access_requests(RequestFilter {
                entity_id: entity_id.map(EntityId),
                user_id: user_id.map(UserId),
            })?;
            print_json(&requests)?;
        }
        Commands::Request { id } => {
            print_json(&services.access.get_access_request(AccessRequestId(id))?)?;
        }
        Commands::CreateRequest {
            entity_id,
            data_types,
            user_id,
            purpose,
        } => {
            let tags: Vec<&str> = data_types.split(',').map(str::trim).collect();
            let data_types = DataType::parse_all(&tags)?;
            let user_id = user_id
                .map(UserId)
                .unwrap_or_else(|| services.cfg.default_user_id());
            let created = services.access.create_access_request(
                EntityId(entity_id),
                user_id,
                &purpose,
                &data_types,
            )?;
            println!(
                "Created access request {} with {} item(s)",
                created.id,
                created.items.len()
            );
        }
        Commands::SetStatus { item_id, status } => {
            let item = services.access.set_item_status(ItemId(item_id), &status)?;
            println!("Item {} is now {}", item.id, item.status.as_str());
        }
        Commands::Documents { user_id } => {
            print_json(&services.documents.get_all(UserId(user_id))?)?;
        }
        Commands::PutDocument {
            user_id,
            data_type,
            document,
        } => {
            let data_type: DataType = data_type.parse()?;
            let document: serde_json::Value = serde_json::from_str(&document)?;
            services.documents.put(UserId(user_id), data_type, document)?;
            println!("Stored {} for user {}", data_type.label(), user_id);
        }
    }

    Ok(())
}
