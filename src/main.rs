use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use simplelog::{Config, WriteLogger};

use involens::extract::DeviceRect;
use involens::panic_handler;
use involens::settings;

/// Drag-to-extract over rendered invoice pages
#[derive(Parser, Debug)]
#[command(name = "involens")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log file
    #[arg(long, default_value = "involens.log")]
    log_file: PathBuf,

    /// Log at debug level regardless of settings
    #[arg(short, long)]
    verbose: bool,

    /// Settings file to use instead of the one in the config directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text runs of a page in page space
    Runs {
        file: PathBuf,

        /// Page index, 0-based
        #[arg(short, long, default_value_t = 0)]
        page: usize,
    },

    /// Render a page to PNG
    Render {
        file: PathBuf,

        #[arg(short, long)]
        out: PathBuf,

        #[arg(short, long, default_value_t = 0)]
        page: usize,

        /// Zoom factor (defaults to the configured default_scale)
        #[arg(short, long)]
        scale: Option<f64>,

        /// Clockwise rotation in degrees: 0, 90, 180 or 270
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,
    },

    /// Drag a rectangle over a rendered page and bind its text to a field
    Extract {
        file: PathBuf,

        /// Form field to fill, e.g. invoice_number
        #[arg(short, long)]
        field: String,

        /// Device-space rectangle as x,y,width,height; negative extents
        /// are dragged backwards
        #[arg(long, value_parser = parse_rect, allow_hyphen_values = true)]
        rect: DeviceRect,

        #[arg(short, long, default_value_t = 0)]
        page: usize,

        #[arg(short, long)]
        scale: Option<f64>,

        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,
    },
}

fn parse_rect(s: &str) -> Result<DeviceRect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in {s:?}: {e}"))?;
    match parts.as_slice() {
        &[x, y, width, height] if parts.iter().all(|v| v.is_finite()) => {
            Ok(DeviceRect::new(x, y, width, height))
        }
        _ => Err(format!("expected x,y,width,height, got {s:?}")),
    }
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();
    let cli = Cli::parse();

    WriteLogger::init(
        LevelFilter::Trace,
        Config::default(),
        File::create(&cli.log_file)?,
    )?;

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    log::set_max_level(if cli.verbose {
        LevelFilter::Debug
    } else {
        settings::get_log_level()
    });

    info!("Starting involens");
    let result = run(cli.command);
    info!("Shutting down involens");
    result
}

#[cfg(not(feature = "pdf"))]
fn run(_command: Command) -> Result<()> {
    anyhow::bail!("involens was built without the `pdf` feature; no renderer is available")
}

#[cfg(feature = "pdf")]
fn run(command: Command) -> Result<()> {
    match command {
        Command::Runs { file, page } => pdf::print_runs(&file, page),
        Command::Render {
            file,
            out,
            page,
            scale,
            rotation,
        } => pdf::render_to_png(&file, &out, page, scale, rotation),
        Command::Extract {
            file,
            field,
            rect,
            page,
            scale,
            rotation,
        } => pdf::extract(&file, &field, rect, page, scale, rotation),
    }
}

#[cfg(feature = "pdf")]
mod pdf {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result, anyhow, bail};
    use log::{info, warn};

    use involens::extract::{
        DeviceRect, Effect, ExtractionEngine, FieldKey, Point, Rotation, SelectionEvent,
        ViewportCommand, ViewportState,
    };
    use involens::form::InvoiceForm;
    use involens::render::{MupdfRenderer, RenderResponse, RenderService};
    use involens::settings;

    const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

    fn open(file: &Path) -> Result<RenderService> {
        let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let renderer = MupdfRenderer::new(settings::get_run_granularity());
        let service = RenderService::new(renderer, Arc::from(bytes), settings::service_config())
            .with_context(|| format!("opening {}", file.display()))?;
        info!(
            "Opened {} ({} pages)",
            file.display(),
            service.document_info().page_count
        );
        Ok(service)
    }

    fn check_page(service: &RenderService, page: usize) -> Result<()> {
        let page_count = service.document_info().page_count;
        if page >= page_count {
            bail!("page {page} out of range (document has {page_count})");
        }
        Ok(())
    }

    /// Viewport commands that bring a fresh state to `page` at the given
    /// scale and rotation
    fn setup_commands(
        service: &RenderService,
        page: usize,
        scale: Option<f64>,
        rotation: i32,
    ) -> Result<Vec<ViewportCommand>> {
        let rotation = Rotation::from_degrees(rotation)?;
        let info = service.document_info();

        let mut commands = vec![ViewportCommand::SetPageCount(info.page_count)];
        commands.extend(info.page_sizes.iter().enumerate().map(|(page, size)| {
            ViewportCommand::SetPageSize {
                page,
                width: size.width,
                height: size.height,
            }
        }));
        commands.push(ViewportCommand::SetScale(
            scale.unwrap_or_else(settings::get_default_scale),
        ));
        commands.push(ViewportCommand::SetRotation(rotation));
        commands.push(ViewportCommand::GoToPage(page));
        Ok(commands)
    }

    fn wait(service: &mut RenderService) -> Result<RenderResponse> {
        service
            .wait_response(RESPONSE_TIMEOUT)
            .ok_or_else(|| anyhow!("timed out waiting for the renderer"))
    }

    pub fn print_runs(file: &Path, page: usize) -> Result<()> {
        let mut service = open(file)?;
        check_page(&service, page)?;
        let id = service.request_text_runs(page);

        loop {
            match wait(&mut service)? {
                RenderResponse::TextRuns { id: got, runs, .. } if got == id => {
                    for run in runs? {
                        println!(
                            "{:8.2} {:8.2} {:8.2} {:8.2}  {}",
                            run.x0, run.y0, run.x1, run.y1, run.text
                        );
                    }
                    return Ok(());
                }
                RenderResponse::Error { error, .. } => return Err(error.into()),
                _ => {}
            }
        }
    }

    pub fn render_to_png(
        file: &Path,
        out: &Path,
        page: usize,
        scale: Option<f64>,
        rotation: i32,
    ) -> Result<()> {
        let mut service = open(file)?;
        check_page(&service, page)?;

        let mut state = ViewportState::new(settings::zoom_limits());
        for cmd in setup_commands(&service, page, scale, rotation)? {
            let _ = state.apply(cmd);
        }
        service.execute_effects(&[Effect::RenderCurrentPage], &state);

        let data = loop {
            match wait(&mut service)? {
                RenderResponse::Page { page: got, data, .. } if got == page => break data,
                RenderResponse::Error { error, .. } => return Err(error.into()),
                _ => {}
            }
        };

        let img = &data.img_data;
        let image = image::RgbImage::from_raw(img.width_px, img.height_px, img.pixels.clone())
            .ok_or_else(|| anyhow!("rendered buffer does not match its dimensions"))?;
        image
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        println!(
            "{}: {}x{} px, scale {}, rotation {}",
            out.display(),
            img.width_px,
            img.height_px,
            data.params.scale,
            data.params.rotation
        );
        Ok(())
    }

    pub fn extract(
        file: &Path,
        field: &str,
        rect: DeviceRect,
        page: usize,
        scale: Option<f64>,
        rotation: i32,
    ) -> Result<()> {
        let mut service = open(file)?;
        check_page(&service, page)?;

        let mut form = InvoiceForm::new();
        let key = FieldKey::new(field);
        if !form.has_field(&key) {
            bail!("unknown field {field:?}");
        }

        let mut engine = ExtractionEngine::new(settings::zoom_limits());
        let mut layer_requested = false;
        for cmd in setup_commands(&service, page, scale, rotation)? {
            let effects = engine.apply_command(cmd, &mut form);
            layer_requested |= effects.contains(&Effect::LoadTextLayer(page));
            service.execute_effects(&effects, engine.viewport_state());
        }
        // Page 0 is current from the start, so no page change asks for it
        if !layer_requested {
            service.request_text_runs(page);
        }

        engine.arm_field(key.clone(), &mut form);
        let end = Point::new(rect.x + rect.width, rect.y + rect.height);
        let _ = engine.handle_pointer(SelectionEvent::Down(Point::new(rect.x, rect.y)), &mut form);
        let _ = engine.handle_pointer(SelectionEvent::Move(end), &mut form);
        let _ = engine.handle_pointer(SelectionEvent::Up(end), &mut form);

        while engine.has_pending_commit() {
            match wait(&mut service)? {
                RenderResponse::TextRuns { page, runs, .. } => {
                    engine.deliver_text_layer(page, runs, &mut form);
                }
                RenderResponse::Error { error, .. } => warn!("Render error: {error}"),
                _ => {}
            }
        }

        println!("{}", form.to_json()?);
        eprintln!("{field}: {:?}", engine.status());
        Ok(())
    }
}
