//! Basic example of the Sanad DI container.

use std::sync::Arc;

use sanad::Injectable;
use sanad::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

#[derive(Injectable)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

#[derive(Injectable)]
struct Database {
    config: Arc<Config>,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.config.database_url)
    }
}

#[derive(Injectable)]
struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

#[derive(Injectable)]
struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
    #[inject(name = "greeting")]
    greeting: String,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("{} user {id}", self.greeting));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("sanad=debug").init();

    let container = Container::builder()
        .validate_on_build(true)
        // Config: a ready-made value
        .instance(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        })
        .register(Registration::value(String::from("Fetching")).named("greeting"))
        // Logger: interface mapped to an implementation, one for the app
        .bind::<dyn Logger, ConsoleLogger, _>(Lifetime::Singleton, |logger| logger)
        // Database: singleton built from its constructor metadata
        .singleton::<Database>()
        // UserRepository: one per child container (e.g. per request)
        .register(Registration::of::<UserRepository>().lifetime(Lifetime::Hierarchical))
        // UserService: new each time
        .transient::<UserService>()
        .build()?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    let config = container.resolve::<Config>()?;
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    {
        let request = container.create_child();

        let service = request.resolve::<UserService>()?;
        println!("👤 {}", service.get_user(42));

        // Same child: UserRepository is reused
        let again = request.resolve::<UserService>()?;
        println!("👤 {}", again.get_user(7));
        println!("♻️  Repository shared: {}", Arc::ptr_eq(&service.repo, &again.repo));
    }

    // Deferred resolution
    let lazy: Lazy<Database> = container.resolve_as()?;
    println!("💤 Lazy database forced: {}", lazy.is_forced());
    println!("🗄️  {}", lazy.get()?.query("SELECT 1"));

    println!("\n🎉 Everything works!");
    Ok(())
}
