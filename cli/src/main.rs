mod digest;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Password;
use myna::ap::crypto::{CertType, KeyType};
use myna::ap::{CryptoAp, Sex, TextAp, VisualAp};
use myna::log::TracingLogger;
use myna::nfc::Transport;
use myna::pcsc::{Context, PcscTransport};
use myna::procedure::{self, Report};
use myna::Card;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Error occurred on communicating with PC/SC: {0}")]
    Pcsc(#[from] myna::pcsc::Error),

    #[error("The card returned an error: {0}")]
    Card(#[from] myna::Error),

    #[error("Could not encode the digest: {0}")]
    Der(#[from] der::Error),

    #[error("Could not serialize the output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

type Session = Rc<Card<PcscTransport>>;

#[derive(Parser)]
#[command(version, about = "Read your My Number card through a PC/SC reader.")]
struct Cli {
    /// Part of the name of the reader to use; the first one is used if not specified
    #[arg(short, long)]
    reader: Option<String>,

    /// How long to wait for the card to be touched, in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// PIN or password to unlock the card; prompted if required and not specified
    #[arg(long)]
    pin: Option<String>,

    /// Prints the result in JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the readers available
    Readers,

    /// Reads the personal number and the attributes of the holder
    Read {
        /// Writes the photo as stored in the card (JPEG 2000) to the file
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Prints the attempts left for each PIN
    Status,

    /// Reads a certificate in DER
    Certificate {
        #[arg(value_enum)]
        ty: CertKind,

        /// File to write the certificate to
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Signs the content of a file using a key-pair in the card
    Sign {
        #[arg(value_enum)]
        key: KeyKind,

        /// File to sign; reads from stdin if not specified
        input: Option<PathBuf>,

        /// File to write the signature to; printed in hex if not specified
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CertKind {
    Auth,
    AuthCa,
    Sign,
    SignCa,
}

impl From<CertKind> for CertType {
    fn from(value: CertKind) -> Self {
        match value {
            CertKind::Auth => Self::Auth,
            CertKind::AuthCa => Self::AuthCA,
            CertKind::Sign => Self::Sign,
            CertKind::SignCa => Self::SignCA,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyKind {
    Auth,
    Sign,
}

impl From<KeyKind> for KeyType {
    fn from(value: KeyKind) -> Self {
        match value {
            KeyKind::Auth => Self::Auth,
            KeyKind::Sign => Self::Sign,
        }
    }
}

/// Information of the holder, with the text decoded.
#[derive(Serialize)]
struct Holder {
    remaining: Option<u8>,
    personal_number: String,
    name: Option<String>,
    address: Option<String>,
    birth: Option<String>,
    sex: Option<Sex>,
    expiry: Option<String>,
}

impl From<&Report> for Holder {
    fn from(report: &Report) -> Self {
        Self {
            remaining: report.remaining,
            personal_number: report.personal_number.clone(),
            name: report.attributes.name_str().map(Into::into),
            address: report.attributes.address_str().map(Into::into),
            birth: report.attributes.birth.clone(),
            sex: report.attributes.sex,
            expiry: report.visual.expiry.clone(),
        }
    }
}

#[derive(Serialize)]
struct Status {
    text: Option<u8>,
    visual: Option<u8>,
    auth: Option<u8>,
    sign: Option<u8>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Readers => {
            for reader in Context::try_new()?.readers()? {
                println!("{}", reader);
            }
        }
        Commands::Read { photo } => {
            let pin = prompt(&cli, "PIN (4 digits)")?;
            let report = procedure::read_card(&open(&cli)?, &pin)?;

            if let (Some(path), Some(data)) = (photo, &report.visual.photo) {
                write_file(path, data)?;
                info!("Wrote the photo to {}", path.display());
            }

            print_holder(&Holder::from(&report), cli.json)?;
        }
        Commands::Status => {
            let status = open(&cli)?.with_connection(|card| {
                let text = TextAp::open(Rc::clone(card))?.lookup_pin_counter()?;
                let visual = VisualAp::open(Rc::clone(card))?.lookup_pin_counter()?;
                let crypto = CryptoAp::open(Rc::clone(card))?;

                Ok(Status {
                    text,
                    visual,
                    auth: crypto.lookup_pin_counter(KeyType::Auth)?,
                    sign: crypto.lookup_pin_counter(KeyType::Sign)?,
                })
            })?;

            print_status(&status, cli.json)?;
        }
        Commands::Certificate { ty, output } => {
            let ty = CertType::from(*ty);
            let pin = match ty.is_pin_required() {
                true => prompt(&cli, "Password (6-16 characters)")?,
                false => String::new(),
            };

            let certificate = open(&cli)?.with_connection(|card| {
                CryptoAp::open(Rc::clone(card))?.read_certificate(ty, pin.as_bytes())
            })?;

            write_file(output, &certificate)?;
            info!("Wrote the certificate to {}", output.display());
        }
        Commands::Sign { key, input, output } => {
            let message = read_input(input.as_deref())?;
            let digest = digest::calculate(&message)?;

            let key = KeyType::from(*key);
            let pin = match key {
                KeyType::Auth => prompt(&cli, "PIN (4 digits)")?,
                KeyType::Sign => prompt(&cli, "Password (6-16 characters)")?,
            };

            let signature = open(&cli)?.with_connection(|card| {
                let ap = CryptoAp::open(Rc::clone(card))?;
                match key {
                    KeyType::Auth => ap.auth(pin.as_bytes(), &digest),
                    KeyType::Sign => ap.sign(pin.as_bytes(), &digest),
                }
            })?;

            match output {
                Some(path) => write_file(path, &signature)?,
                None => println!("{}", hex::encode(signature)),
            }
        }
    }

    Ok(())
}

/// Opens the session on the reader selected.
fn open(cli: &Cli) -> Result<Session> {
    let ctx = Context::try_new()?;
    let device = match &cli.reader {
        Some(name) => ctx.open_by_name(name)?,
        None => ctx.open()?,
    };

    info!("Using reader: {}", device.name());

    let mut transport = device.into_transport(ctx);
    transport.set_timeout(Duration::from_millis(cli.timeout_ms));

    Ok(Rc::new(Card::new(transport, Rc::new(TracingLogger))))
}

fn prompt(cli: &Cli, message: &str) -> Result<String> {
    match &cli.pin {
        Some(pin) => Ok(pin.clone()),
        None => Ok(Password::new().with_prompt(message).interact()?),
    }
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match path {
        Some(path) => File::open(path)?.read_to_end(&mut buf)?,
        None => io::stdin().read_to_end(&mut buf)?,
    };

    Ok(buf)
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    File::create(path)?.write_all(data)?;

    Ok(())
}

fn print_holder(holder: &Holder, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(holder)?);
        return Ok(());
    }

    println!("Personal number: {}", holder.personal_number);
    println!("Name:            {}", holder.name.as_deref().unwrap_or("-"));
    println!("Address:         {}", holder.address.as_deref().unwrap_or("-"));
    println!("Date of birth:   {}", holder.birth.as_deref().unwrap_or("-"));
    println!(
        "Sex:             {}",
        holder.sex.map_or("-".to_owned(), |s| format!("{:?}", s))
    );
    println!("Expiry:          {}", holder.expiry.as_deref().unwrap_or("-"));
    println!("Attempts left:   {}", describe(holder.remaining));

    Ok(())
}

fn print_status(status: &Status, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    println!("Text AP PIN:      {}", describe(status.text));
    println!("Visual AP PIN A:  {}", describe(status.visual));
    println!("JPKI auth PIN:    {}", describe(status.auth));
    println!("JPKI sign PIN:    {}", describe(status.sign));

    Ok(())
}

fn describe(count: Option<u8>) -> String {
    count.map_or_else(|| "unknown".to_owned(), |c| c.to_string())
}
