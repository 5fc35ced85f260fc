use clap::Parser;
use ghostpay::application::cards::{CardService, CreateCardRequest};
use ghostpay::config::{
    self, CardCommand, ChargeCommand, Cli, Command, ServeCommand, Stores, open_stores,
};
use ghostpay::domain::charge::ChargeRequest;
use ghostpay::error::PaymentError;
use ghostpay::interfaces::http;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stores = open_stores(cli.db_path.as_deref()).map_err(report)?;

    match cli.command {
        Command::Serve(command) => serve(command, stores).await,
        Command::Card(command) => run_card(command, stores).await,
        Command::Charge(command) => run_charge(command, stores).await,
    }
}

async fn serve(command: ServeCommand, stores: Stores) -> Result<()> {
    let (addr, router) = match command {
        ServeCommand::CardService { listen, port } => {
            let service = Arc::new(CardService::new(stores.cards));
            (address(listen.host, port), http::card_service(service))
        }
        ServeCommand::ChargeService {
            listen,
            port,
            card_service_url,
            charging,
        } => {
            info!(%card_service_url, "using remote card service");
            let orchestrator =
                config::remote_orchestrator(&card_service_url, stores.charges, &charging)
                    .map_err(report)?;
            (
                address(listen.host, port),
                http::charge_service(Arc::new(orchestrator)),
            )
        }
        ServeCommand::Standalone {
            listen,
            port,
            charging,
        } => {
            let (service, orchestrator) = config::local_services(stores, &charging);
            (
                address(listen.host, port),
                http::standalone(service, Arc::new(orchestrator)),
            )
        }
    };

    let listener = TcpListener::bind(addr).await.into_diagnostic()?;
    info!(%addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()
}

async fn run_card(command: CardCommand, stores: Stores) -> Result<()> {
    let service = CardService::new(stores.cards);
    match command {
        CardCommand::Create {
            amount,
            currency,
            metadata,
        } => {
            let request = CreateCardRequest {
                amount: Some(amount),
                currency: Some(currency),
                metadata,
            };
            print_json(&service.create_card(request).await.map_err(report)?)
        }
        CardCommand::Get { id } => print_json(&service.get_card(&id).await.map_err(report)?),
        CardCommand::Retire { id, status } => {
            print_json(&service.retire_card(id, status).await.map_err(report)?)
        }
    }
}

async fn run_charge(command: ChargeCommand, stores: Stores) -> Result<()> {
    match command {
        ChargeCommand::Create {
            card_id,
            amount,
            currency,
            description,
            metadata,
            card_service_url,
            charging,
        } => {
            let orchestrator = match card_service_url {
                Some(url) => config::remote_orchestrator(&url, stores.charges, &charging)
                    .map_err(report)?,
                None => config::local_services(stores, &charging).1,
            };
            let request = ChargeRequest {
                card_id: Some(card_id),
                amount: Some(amount),
                currency: Some(currency),
                description,
                metadata,
            };
            print_json(&orchestrator.create_charge(request).await.map_err(report)?)
        }
        ChargeCommand::Get { id } => {
            let (_, orchestrator) = config::local_services(stores, &Default::default());
            print_json(&orchestrator.get_charge(id).await.map_err(report)?)
        }
        ChargeCommand::List { card_id } => {
            let (_, orchestrator) = config::local_services(stores, &Default::default());
            print_json(&orchestrator.charges_for_card(card_id).await.map_err(report)?)
        }
    }
}

fn address(host: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(host, port)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn report(err: PaymentError) -> miette::Report {
    miette::miette!("{}: {err}", err.code())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
