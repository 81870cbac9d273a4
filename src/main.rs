//! letterforge – command-line letterhead generator.
//!
//! Usage:
//!   letterforge <request.json> [output.pdf] [--measurer sandbox|metrics]
//!               [--assets DIR] [--config CONFIG.json] [--html OUT.html]
//!               [--pages-json OUT.json]
//!   letterforge --list-templates
//!
//! If `output.pdf` is omitted the PDF is written next to the request file
//! with the same stem (e.g. `letter.json` → `letter.pdf`).

use std::{env, fs, path::Path, path::PathBuf, process};

use letterforge::measure::MeasurerKind;
use letterforge::pipeline::{generate_pdf, CancelToken, GenerationRequest, PipelineConfig};
use letterforge::templates;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut html_path: Option<PathBuf> = None;
    let mut pages_path: Option<PathBuf> = None;
    let mut assets_dir: Option<PathBuf> = None;
    let mut measurer: Option<MeasurerKind> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--measurer" | "-m" => {
                let value = flag_value(&mut iter, arg, &args[0]);
                match value.parse() {
                    Ok(kind) => measurer = Some(kind),
                    Err(e) => {
                        eprintln!("Error: {e}");
                        process::exit(1);
                    }
                }
            }
            "--assets" | "-a" => assets_dir = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--config" | "-c" => config_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--html" => html_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--pages-json" => pages_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--list-templates" => {
                for t in templates::all() {
                    println!("{:<26} {:<12} {}", t.id, t.company, t.name);
                }
                process::exit(0);
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no request file specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let output = output_path.unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("pdf");
        o
    });

    let mut config = match &config_path {
        Some(p) => match PipelineConfig::from_file(p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error reading config '{}': {e}", p.display());
                process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };
    if let Some(kind) = measurer {
        config.measurer = kind;
    }
    if assets_dir.is_some() {
        config.assets_dir = assets_dir;
    }

    let request = match fs::read_to_string(&input)
        .map_err(letterforge::Error::from)
        .and_then(|json| GenerationRequest::from_json(&json))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading request '{}': {e}", input.display());
            process::exit(1);
        }
    };

    match generate_pdf(&request, &config, &CancelToken::new()) {
        Ok((bytes, document)) => {
            write_or_exit(&output, &bytes);
            if let Some(path) = &html_path {
                write_or_exit(path, document.html.as_bytes());
            }
            if let Some(path) = &pages_path {
                match document.pages_json() {
                    Ok(json) => write_or_exit(path, json.as_bytes()),
                    Err(e) => {
                        eprintln!("Error serializing pages: {e}");
                        process::exit(1);
                    }
                }
            }
            let pages = document.page_count();
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{})",
                output.display(),
                bytes.len(),
                pages,
                if pages == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error generating letter: {e}");
            process::exit(1);
        }
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn write_or_exit(path: &Path, bytes: &[u8]) {
    // Create output directory if necessary.
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    if let Err(e) = fs::write(path, bytes) {
        eprintln!("Error writing '{}': {e}", path.display());
        process::exit(1);
    }
}

fn print_usage(prog: &str) {
    eprintln!("letterforge – letterhead generator");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <request.json> [output.pdf] [flags]");
    eprintln!("  {prog} --list-templates");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <request.json>  {{\"formData\": {{...}}, \"templateId\": \"...\", \"shouldMeasure\": true}}");
    eprintln!("  [output.pdf]    Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --measurer, -m  sandbox (default) or metrics");
    eprintln!("  --assets, -a    Directory with logos, stamps and backgrounds");
    eprintln!("  --config, -c    Pipeline config JSON");
    eprintln!("  --html          Also write the rendered HTML document");
    eprintln!("  --pages-json    Also write the packed pages as JSON");
    eprintln!("  --list-templates  Print registered templates");
    eprintln!("  --help          Print this message");
}
