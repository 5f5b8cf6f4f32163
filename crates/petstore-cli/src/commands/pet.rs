//! Pet record commands
//!
//! Each invocation runs one session and commits at most once.

use clap::{Args, Subcommand};
use petstore_core::{ExError, Pet, PetColumn, PetId, PetStoreError, StoreConfig};
use petstore_store::Database;

#[derive(Debug, Args)]
pub struct PetArgs {
    #[command(subcommand)]
    pub command: PetCommand,
}

#[derive(Debug, Subcommand)]
pub enum PetCommand {
    /// Insert a new pet
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: String,
    },
    /// List stored pets
    List {
        /// Only pets of this species
        #[arg(long)]
        species: Option<String>,
        /// Column to sort by (id, name or species)
        #[arg(long, default_value = "id")]
        order_by: PetColumn,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one pet
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Change a pet's name or species
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        species: Option<String>,
    },
    /// Delete one pet
    Delete { id: i64 },
    /// Delete every pet
    Clear,
    /// Count pets
    Count {
        #[arg(long)]
        species: Option<String>,
    },
}

pub fn execute(args: PetArgs, config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open(config)?;
    let result = match args.command {
        PetCommand::Add { name, species } => execute_add(&mut db, name, species),
        PetCommand::List {
            species,
            order_by,
            desc,
            json,
        } => execute_list(&mut db, species, order_by, desc, json),
        PetCommand::Get { id, json } => execute_get(&mut db, PetId::new(id), json),
        PetCommand::Update { id, name, species } => {
            execute_update(&mut db, PetId::new(id), name, species)
        }
        PetCommand::Delete { id } => execute_delete(&mut db, PetId::new(id)),
        PetCommand::Clear => execute_clear(&mut db),
        PetCommand::Count { species } => execute_count(&mut db, species),
    };
    db.close()?;
    result
}

fn not_found(id: PetId) -> Box<dyn std::error::Error> {
    Box::new(ExError::from(PetStoreError::PetNotFound { pet_id: id.get() }))
}

fn execute_add(
    db: &mut Database,
    name: String,
    species: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    let ticket = session.stage_insert(Pet::new(name, species))?;
    let summary = session.commit()?;

    let id = summary.id_of(ticket).ok_or("insert was not assigned an id")?;
    match session.get_by_id(id)? {
        Some(pet) => println!("Added {}", pet),
        None => return Err(not_found(id)),
    }
    Ok(())
}

fn execute_list(
    db: &mut Database,
    species: Option<String>,
    order_by: PetColumn,
    desc: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    let mut query = session.query();
    if let Some(species) = species {
        query = query.filter(PetColumn::Species.eq(species));
    }
    query = if desc {
        query.order_by_desc(order_by)
    } else {
        query.order_by(order_by)
    };
    let pets = query.fetch_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pets)?);
    } else {
        for pet in &pets {
            println!("{}", pet);
        }
    }
    Ok(())
}

fn execute_get(db: &mut Database, id: PetId, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    let pet = session.get_by_id(id)?.ok_or_else(|| not_found(id))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&*pet)?);
    } else {
        println!("{}", pet);
    }
    Ok(())
}

fn execute_update(
    db: &mut Database,
    id: PetId,
    name: Option<String>,
    species: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if name.is_none() && species.is_none() {
        return Err("nothing to update: pass --name and/or --species".into());
    }

    let mut session = db.session();
    {
        let pet = session.get_by_id(id)?.ok_or_else(|| not_found(id))?;
        if let Some(name) = name {
            pet.name = Some(name);
        }
        if let Some(species) = species {
            pet.species = Some(species);
        }
    }
    let summary = session.commit()?;

    match session.get_by_id(id)? {
        Some(pet) if !summary.updated.is_empty() => println!("Updated {}", pet),
        Some(pet) => println!("Unchanged {}", pet),
        None => return Err(not_found(id)),
    }
    Ok(())
}

fn execute_delete(db: &mut Database, id: PetId) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    session.stage_delete(id)?;
    session.commit()?;
    println!("Deleted pet {}", id);
    Ok(())
}

fn execute_clear(db: &mut Database) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    let count = session.delete_all()?;
    session.commit()?;
    println!("Deleted {} pets", count);
    Ok(())
}

fn execute_count(
    db: &mut Database,
    species: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = db.session();
    let mut query = session.query();
    if let Some(species) = species {
        query = query.filter(PetColumn::Species.eq(species));
    }
    println!("{}", query.count()?);
    Ok(())
}
