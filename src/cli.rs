use clap::{Args, Parser, Subcommand};
use photo_gallery::{
    AdjustmentUpdate, FilterBy, ImageRecord, Notification, NotificationLevel, RotateDirection,
    SortBy, SortOrder, UploadFile, ViewMode, ViewParams, YearMonth,
};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::{connect, AppSession};

#[derive(Parser, Debug)]
#[command(name = "restyle", about = "Browse, filter, edit and re-upload your restyled images")]
pub struct Cli {
    /// Configuration file (default: ./restyle.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the gallery
    List {
        #[command(flatten)]
        view: ViewArgs,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the months that have images
    Months,
    /// Upload an image file
    Upload { path: PathBuf },
    /// Adjust the image at a position of the view and save it as a new image
    Edit {
        index: usize,
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        adjust: AdjustArgs,
    },
    /// Request a style transformation of the image at a position of the view
    Transform {
        index: usize,
        style: String,
        #[command(flatten)]
        view: ViewArgs,
    },
}

/// Overrides of the configured view
#[derive(Args, Debug, Default, Clone)]
pub struct ViewArgs {
    /// Case-insensitive search in names and tags
    #[arg(long)]
    pub search: Option<String>,
    /// all, favorites, recent, large or edited
    #[arg(long)]
    pub filter: Option<FilterBy>,
    /// date, name or size
    #[arg(long)]
    pub sort: Option<SortBy>,
    /// asc or desc
    #[arg(long)]
    pub order: Option<SortOrder>,
    /// YYYY-MM
    #[arg(long)]
    pub month: Option<YearMonth>,
    /// Detailed list instead of the grid
    #[arg(long)]
    pub details: bool,
}

impl ViewArgs {
    fn apply(&self, params: &mut ViewParams, mode: &mut ViewMode) {
        if let Some(search) = &self.search {
            params.search_term = search.clone();
        }
        if let Some(filter) = self.filter {
            params.filter_by = filter;
        }
        if let Some(sort) = self.sort {
            params.sort_by = sort;
        }
        if let Some(order) = self.order {
            params.sort_order = order;
        }
        if self.month.is_some() {
            params.month = self.month;
        }
        if self.details {
            *mode = ViewMode::List;
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct AdjustArgs {
    /// Percent, 100 keeps the image as is
    #[arg(long)]
    pub brightness: Option<f32>,
    #[arg(long)]
    pub contrast: Option<f32>,
    #[arg(long)]
    pub saturation: Option<f32>,
    /// Quarter turns, negative values rotate counter-clockwise
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub rotate: i32,
    #[arg(long)]
    pub grayscale: bool,
    #[arg(long)]
    pub sepia: bool,
}

impl AdjustArgs {
    fn updates(&self) -> Vec<AdjustmentUpdate> {
        let mut updates = vec![AdjustmentUpdate {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            grayscale: self.grayscale.then_some(true),
            sepia: self.sepia.then_some(true),
            rotate: None,
        }];
        let direction = if self.rotate < 0 {
            RotateDirection::CounterClockwise
        } else {
            RotateDirection::Clockwise
        };
        for _ in 0..self.rotate.unsigned_abs() {
            updates.push(AdjustmentUpdate::rotate(direction));
        }
        updates
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    let mut connection = connect(&config).await?;
    connection.load().await?;

    let mut params = config.view.to_params()?;
    let mut mode = config.view.mode;
    let command = cli.command.unwrap_or(Command::List {
        view: ViewArgs::default(),
        json: false,
    });

    let result = execute(&mut connection.session, command, &mut params, &mut mode).await;
    print_notifications(&connection.session.drain_notifications());
    connection.disconnect().await?;
    result
}

async fn execute(
    session: &mut AppSession,
    command: Command,
    params: &mut ViewParams,
    mode: &mut ViewMode,
) -> Result<(), AppError> {
    match command {
        Command::List { view, json } => {
            view.apply(params, mode);
            session.set_view(params.clone());
            session.set_view_mode(*mode);
            let records = session.view();
            if json {
                let out = serde_json::to_string_pretty(&records)
                    .map_err(|e| AppError::Other(format!("JSON serialize failed: {}", e)))?;
                println!("{}", out);
            } else {
                print!("{}", format_view(&records, session.view_mode()));
            }
        }
        Command::Months => {
            for month in session.available_months() {
                println!("{}  {}", month.value, month.label);
            }
        }
        Command::Upload { path } => {
            let bytes = std::fs::read(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| AppError::Validation(format!("{} is not a file", path.display())))?;
            let record = session.upload(UploadFile::new(&name, bytes)).await?;
            println!("{}", record.source_url);
        }
        Command::Edit { index, view, adjust } => {
            view.apply(params, mode);
            session.set_view(params.clone());
            session.begin_edit(index).await?;
            for update in adjust.updates() {
                session.apply_adjustments(&update)?;
            }
            let record = session.save_edit().await?;
            println!("{}", record.source_url);
        }
        Command::Transform { index, style, view } => {
            view.apply(params, mode);
            session.set_view(params.clone());
            let id = session
                .view()
                .get(index)
                .map(|r| r.id.clone())
                .ok_or_else(|| AppError::Validation(format!("No image at position {}", index)))?;
            let record = session.request_transformation(&id, &style).await?;
            println!("{} ({})", record.name, record.id);
        }
    }
    Ok(())
}

const GRID_COLUMNS: usize = 4;
const GRID_CELL: usize = 28;

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let cut: String = name.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Renders the view as text, numbered by view position
pub fn format_view(records: &[&ImageRecord], mode: ViewMode) -> String {
    if records.is_empty() {
        return "No images\n".to_string();
    }

    let mut out = String::new();
    match mode {
        ViewMode::Grid => {
            for row in records.chunks(GRID_COLUMNS).enumerate() {
                let (row_index, chunk) = row;
                let line: Vec<String> = chunk
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        let index = row_index * GRID_COLUMNS + i;
                        let marker = if r.favorite { "*" } else { " " };
                        let cell = format!("{:>3}{} {}", index, marker, truncate(&r.name, GRID_CELL - 6));
                        format!("{:<width$}", cell, width = GRID_CELL)
                    })
                    .collect();
                out.push_str(line.join("").trim_end());
                out.push('\n');
            }
        }
        ViewMode::List => {
            for (index, r) in records.iter().enumerate() {
                let tags: Vec<&str> = r.tags.iter().map(String::as_str).collect();
                out.push_str(&format!(
                    "{:>3} {}{} {:<32} {:>9}  {}  {}\n",
                    index,
                    if r.favorite { "*" } else { " " },
                    if r.edited { "e" } else { " " },
                    truncate(&r.name, 32),
                    r.size_label,
                    r.created_at.format("%Y-%m-%d %H:%M"),
                    tags.join(", ")
                ));
            }
        }
    }
    out.push_str(&format!(
        "{} {}\n",
        records.len(),
        if records.len() == 1 { "image" } else { "images" }
    ));
    out
}

fn print_notifications(notifications: &[Notification]) {
    for n in notifications {
        match n.level {
            NotificationLevel::Success => eprintln!("{}: {}", n.title, n.message),
            NotificationLevel::Error => eprintln!("error: {}: {}", n.title, n.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(name: &str) -> ImageRecord {
        ImageRecord::new(
            format!("storage:me/{}", name),
            format!("file:///data/me/{}", name),
            name.to_string(),
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
        )
        .with_size(3 * 1024 * 1024 + 512 * 1024)
        .with_tag("uploaded")
    }

    #[test]
    fn test_parse_list_arguments() {
        let cli = Cli::try_parse_from([
            "restyle", "--config", "my.toml", "list", "--filter", "large", "--sort", "size",
            "--order", "asc", "--month", "2025-03", "--details",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        match cli.command {
            Some(Command::List { view, json }) => {
                assert!(!json);
                let mut params = ViewParams::default();
                let mut mode = ViewMode::Grid;
                view.apply(&mut params, &mut mode);
                assert_eq!(params.filter_by, FilterBy::Large);
                assert_eq!(params.sort_by, SortBy::Size);
                assert_eq!(params.sort_order, SortOrder::Asc);
                assert_eq!(params.month.map(|m| m.to_string()).as_deref(), Some("2025-03"));
                assert_eq!(mode, ViewMode::List);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_filter() {
        assert!(Cli::try_parse_from(["restyle", "list", "--filter", "huge"]).is_err());
    }

    #[test]
    fn test_edit_updates() {
        let cli = Cli::try_parse_from(["restyle", "edit", "2", "--grayscale", "--rotate", "-2"]).unwrap();
        match cli.command {
            Some(Command::Edit { index, adjust, .. }) => {
                assert_eq!(index, 2);
                let mut params = photo_gallery::AdjustmentParams::default();
                for update in adjust.updates() {
                    params.apply(&update);
                }
                assert!(params.grayscale);
                assert!(!params.sepia);
                assert_eq!(params.rotation, -180);
                assert_eq!(params.brightness, 100.0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_format_list_view() {
        let mut fav = record("cat.png");
        fav.favorite = true;
        let dog = record("dog.png");
        let out = format_view(&[&fav, &dog], ViewMode::List);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  0 * "));
        assert!(lines[0].contains("3.5 MB"));
        assert!(lines[0].contains("2025-03-01 09:30"));
        assert!(lines[1].starts_with("  1   "));
        assert_eq!(lines[2], "2 images");
    }

    #[test]
    fn test_format_grid_view() {
        let records: Vec<ImageRecord> = (0..5).map(|i| record(&format!("{}.png", i))).collect();
        let refs: Vec<&ImageRecord> = records.iter().collect();
        let out = format_view(&refs, ViewMode::Grid);
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().nth(1).unwrap().starts_with("  4  4.png"));
        assert_eq!(format_view(&[], ViewMode::Grid), "No images\n");
    }
}
