//! vems-seed - trusted operator seeding tool
//!
//! The only path that creates villages and elevated-role identities. Public
//! registration always produces villagers; heads and supers are provisioned
//! here, off the HTTP surface, by an operator with direct database access.
//!
//! Each subcommand is create-or-update: running it twice converges on the
//! same state.

use bson::doc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vems::auth::hash_password;
use vems::db::schemas::{
    SupAccessDoc, UserDoc, VillageDoc, SUP_ACCESS_COLLECTION, USER_COLLECTION, VILLAGE_COLLECTION,
};
use vems::db::MongoClient;
use vems::policy::Role;

#[derive(Parser, Debug)]
#[command(name = "vems-seed")]
#[command(about = "Provision villages, heads, and supers for the VEMS backend")]
struct SeedArgs {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "vems")]
    mongodb_db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update a village
    Village {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0)]
        population: i64,
    },
    /// Create or update a village head
    Head {
        /// External user identifier
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        /// The village this head administers
        #[arg(long)]
        village: i64,
    },
    /// Create or update a super with a village scope assignment
    Super {
        /// External user identifier
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        /// Villages in scope, comma separated (e.g. --villages 1,2,3)
        #[arg(long, value_delimiter = ',')]
        villages: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = SeedArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vems=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;

    match args.command {
        Command::Village {
            id,
            name,
            population,
        } => seed_village(&mongo, id, name, population).await?,
        Command::Head {
            id,
            name,
            email,
            password,
            phone,
            village,
        } => {
            seed_user(
                &mongo,
                id,
                name,
                email,
                password,
                phone,
                Role::Head,
                Some(village),
            )
            .await?
        }
        Command::Super {
            id,
            name,
            email,
            password,
            phone,
            villages,
        } => {
            seed_user(&mongo, id.clone(), name, email, password, phone, Role::Super, None).await?;
            seed_sup_access(&mongo, id, villages).await?;
        }
    }

    info!("Done");
    Ok(())
}

async fn seed_village(
    mongo: &MongoClient,
    id: i64,
    name: String,
    population: i64,
) -> anyhow::Result<()> {
    let villages = mongo.collection::<VillageDoc>(VILLAGE_COLLECTION).await?;

    match villages.find_one(doc! { "village_id": id }).await? {
        Some(_) => {
            villages
                .update_one(
                    doc! { "village_id": id },
                    doc! { "$set": {
                        "name": &name,
                        "population": population,
                        "metadata.updated_at": bson::DateTime::now(),
                    }},
                )
                .await?;
            info!("Updated village {} ({})", id, name);
        }
        None => {
            villages
                .insert_one(VillageDoc::new(id, name.clone(), population))
                .await?;
            info!("Created village {} ({})", id, name);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn seed_user(
    mongo: &MongoClient,
    real_id: String,
    name: String,
    email: String,
    password: String,
    phone: String,
    role: Role,
    assigned_village: Option<i64>,
) -> anyhow::Result<()> {
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let password_hash = hash_password(&password)?;

    match users.find_one(doc! { "real_id": &real_id }).await? {
        Some(_) => {
            let mut set = doc! {
                "name": &name,
                "email": &email,
                "password_hash": &password_hash,
                "phone": &phone,
                "role": role.to_string(),
                "metadata.updated_at": bson::DateTime::now(),
            };
            if let Some(v) = assigned_village {
                set.insert("assigned_village", v);
            }
            users
                .update_one(doc! { "real_id": &real_id }, doc! { "$set": set })
                .await?;
            info!("Updated {} {} ({})", role, real_id, email);
        }
        None => {
            users
                .insert_one(UserDoc::new(
                    real_id.clone(),
                    name,
                    email.clone(),
                    password_hash,
                    phone,
                    role,
                    assigned_village,
                ))
                .await?;
            info!("Created {} {} ({})", role, real_id, email);
        }
    }

    Ok(())
}

async fn seed_sup_access(
    mongo: &MongoClient,
    user_id: String,
    villages: Vec<i64>,
) -> anyhow::Result<()> {
    let assignments = mongo
        .collection::<SupAccessDoc>(SUP_ACCESS_COLLECTION)
        .await?;

    match assignments.find_one(doc! { "user_id": &user_id }).await? {
        Some(_) => {
            assignments
                .update_one(
                    doc! { "user_id": &user_id },
                    doc! { "$set": {
                        "village_ids": villages.clone(),
                        "metadata.updated_at": bson::DateTime::now(),
                    }},
                )
                .await?;
            info!("Updated scope assignment for {}: {:?}", user_id, villages);
        }
        None => {
            assignments
                .insert_one(SupAccessDoc::new(user_id.clone(), villages.clone()))
                .await?;
            info!("Created scope assignment for {}: {:?}", user_id, villages);
        }
    }

    Ok(())
}
