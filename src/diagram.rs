//! Renders `aafigure` diagram blocks into inline SVG. The heavy lifting is
//! delegated to the external `aafigure` executable: the diagram source is
//! piped to its stdin and its SVG output is read back from stdout. The output
//! is then adapted for embedding in a page:
//!
//! 1. The three preamble lines `aafigure` prints ahead of the `<svg>` element
//!    (XML declaration, DOCTYPE, blank line) are dropped ([`strip_header`]).
//! 2. The `<svg>` element is forced to scale to its container's width
//!    ([`inject_width_style`]).
//! 3. The result is wrapped in a `<div>` ([`wrap`]).
//!
//! Any failure here is fatal to the build. A broken diagram must never
//! silently vanish from a post.

use log::debug;
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;
use std::thread;

/// The renderer program used when none is configured. It must be on `PATH`.
pub const DEFAULT_PROGRAM: &str = "aafigure";

/// The number of preamble lines `aafigure` emits ahead of the SVG payload.
pub const HEADER_LINES: usize = 3;

const SVG_TAG: &str = "<svg ";
const WIDTH_ATTRIBUTE: &str = r#"style="width:100%""#;

/// Converts a diagram block (its source text and the option string from the
/// block's info string) into an HTML fragment.
pub trait Render {
    fn render(&self, source: &str, options: &str) -> Result<String>;
}

/// Renders diagrams by running the `aafigure` executable once per block.
#[derive(Clone, Debug)]
pub struct Aafigure {
    /// The program followed by any leading arguments. The block's options
    /// and the forced `--type svg` are appended after these.
    command: Vec<String>,
}

impl Default for Aafigure {
    fn default() -> Self {
        Aafigure::new(vec![DEFAULT_PROGRAM.to_owned()])
    }
}

impl Aafigure {
    pub fn new(command: Vec<String>) -> Aafigure {
        Aafigure { command }
    }

    /// Runs the renderer on `source` and returns its raw stdout.
    fn run(&self, source: &str, options: &str) -> Result<String> {
        let (program, leading) =
            self.command.split_first().ok_or(Error::EmptyCommand)?;
        let args = invocation_args(options);
        debug!(program = program.as_str(), args:? = args; "running diagram renderer");

        let mut child = Command::new(program)
            .args(leading)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::Spawn {
                program: program.clone(),
                err,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "renderer stdin is not piped",
            ))
        })?;

        // Feed stdin from a helper thread so a large SVG can't fill the
        // stdout pipe while we're still blocked writing the source. `stdin`
        // is dropped when the thread returns, which closes the pipe.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(source.as_bytes()));
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;

        if !output.status.success() {
            return Err(Error::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        match written.unwrap_or_else(|panic| std::panic::resume_unwind(panic)) {
            // The renderer succeeded without reading everything; its output
            // is still what we asked for.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
            Err(err) => return Err(Error::Io(err)),
            Ok(()) => {}
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

impl Render for Aafigure {
    fn render(&self, source: &str, options: &str) -> Result<String> {
        filter_output(&self.run(source, options)?)
    }
}

/// Builds the argument list for one invocation from a block's option string.
/// Options are split on whitespace. Any output-type flag the author supplied
/// is dropped and `--type svg` is appended, so the result always requests
/// SVG.
pub fn invocation_args(options: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut tokens = options.split_whitespace();
    while let Some(token) = tokens.next() {
        match token {
            "-t" | "--type" => {
                // skip the flag's value too
                tokens.next();
            }
            t if t.starts_with("--type=") => {}
            t if t.starts_with("-t") && !t.starts_with("--") => {}
            t => args.push(t.to_owned()),
        }
    }
    args.push("--type".to_owned());
    args.push("svg".to_owned());
    args
}

/// Turns raw renderer output into the block's HTML: strips the preamble,
/// injects the width style and wraps the markup in a `<div>`.
pub fn filter_output(raw: &str) -> Result<String> {
    let body = strip_header(raw)?;
    Ok(wrap(&inject_width_style(&body)))
}

/// Drops the first [`HEADER_LINES`] lines of `raw` and returns the remaining
/// lines, each terminated by `\n`. Output with fewer lines than the preamble
/// is rejected as [`Error::MalformedOutput`].
pub fn strip_header(raw: &str) -> Result<String> {
    let mut lines = raw.lines();
    for seen in 0..HEADER_LINES {
        if lines.next().is_none() {
            return Err(Error::MalformedOutput {
                lines: seen,
                output: raw.to_owned(),
            });
        }
    }

    let mut body = String::with_capacity(raw.len());
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    Ok(body)
}

/// Inserts `style="width:100%"` right after the first `<svg `. This is a
/// plain substring search: markup without a `<svg ` is returned unchanged.
/// Markup that already carries the attribute in that position is also
/// returned unchanged.
pub fn inject_width_style(markup: &str) -> Cow<'_, str> {
    let at = match markup.find(SVG_TAG) {
        Some(start) => start + SVG_TAG.len(),
        None => return Cow::Borrowed(markup),
    };
    if markup[at..].starts_with(WIDTH_ATTRIBUTE) {
        return Cow::Borrowed(markup);
    }

    let mut injected =
        String::with_capacity(markup.len() + WIDTH_ATTRIBUTE.len() + 1);
    injected.push_str(&markup[..at]);
    injected.push_str(WIDTH_ATTRIBUTE);
    injected.push(' ');
    injected.push_str(&markup[at..]);
    Cow::Owned(injected)
}

/// Wraps `markup` in the container element.
pub fn wrap(markup: &str) -> String {
    format!("<div>{}</div>", markup)
}

/// The result of a fallible diagram operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to render a diagram block.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configured renderer command is empty.
    EmptyCommand,

    /// Returned when the renderer couldn't be started, usually because it
    /// isn't installed.
    Spawn { program: String, err: io::Error },

    /// Returned when the renderer exited unsuccessfully.
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Returned when the renderer's output isn't valid UTF-8.
    Encoding(FromUtf8Error),

    /// Returned when the renderer's output is shorter than the preamble it
    /// is expected to start with.
    MalformedOutput { lines: usize, output: String },

    /// Returned for I/O errors on the renderer's pipes.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyCommand => {
                write!(f, "no diagram renderer command configured")
            }
            Error::Spawn { program, err } => write!(
                f,
                "starting diagram renderer `{}` (is it installed?): {}",
                program, err
            ),
            Error::Failed {
                program,
                status,
                stderr,
            } => {
                write!(f, "diagram renderer `{}` failed ({})", program, status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Error::Encoding(err) => {
                write!(f, "diagram renderer output is not UTF-8: {}", err)
            }
            Error::MalformedOutput { lines, output } => write!(
                f,
                "malformed diagram renderer output: expected at least {} \
                 preamble lines, got {}: {:?}",
                HEADER_LINES, lines, output
            ),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::EmptyCommand => None,
            Error::Spawn { program: _, err } => Some(err),
            Error::Failed { .. } => None,
            Error::Encoding(err) => Some(err),
            Error::MalformedOutput { .. } => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator on pipe operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::Encoding(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PREAMBLE: &str = "<?xml version=\"1.0\"?>\n\
                            <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\">\n\
                            \n";

    fn fake(script: &str) -> Aafigure {
        Aafigure::new(vec![
            "sh".to_owned(),
            format!("./testdata/bin/{}", script),
        ])
    }

    #[test]
    fn test_strip_header() -> Result<()> {
        let raw = format!("{}<svg width=\"1\">\n<rect/>\n</svg>\n", PREAMBLE);
        assert_eq!("<svg width=\"1\">\n<rect/>\n</svg>\n", strip_header(&raw)?);
        Ok(())
    }

    #[test]
    fn test_strip_header_restores_final_newline() -> Result<()> {
        let raw = format!("{}<svg/>", PREAMBLE);
        assert_eq!("<svg/>\n", strip_header(&raw)?);
        Ok(())
    }

    #[test]
    fn test_strip_header_preamble_only() -> Result<()> {
        assert_eq!("", strip_header(PREAMBLE)?);
        Ok(())
    }

    #[test]
    fn test_strip_header_short_output() {
        match strip_header("Traceback (most recent call last):\n") {
            Err(Error::MalformedOutput { lines, .. }) => assert_eq!(1, lines),
            other => panic!("wanted MalformedOutput, got {:?}", other),
        }
        assert!(matches!(
            strip_header(""),
            Err(Error::MalformedOutput { lines: 0, .. })
        ));
    }

    #[test]
    fn test_inject_width_style() {
        assert_eq!(
            r#"<svg style="width:100%" width="100" height="50"><rect/></svg>"#,
            inject_width_style(r#"<svg width="100" height="50"><rect/></svg>"#),
        );
    }

    #[test]
    fn test_inject_width_style_first_occurrence_only() {
        assert_eq!(
            r#"<svg style="width:100%" a="1"><svg b="2"/></svg>"#,
            inject_width_style(r#"<svg a="1"><svg b="2"/></svg>"#),
        );
    }

    #[test]
    fn test_inject_width_style_is_idempotent() {
        let once = inject_width_style(r#"<svg width="100"></svg>"#).into_owned();
        assert_eq!(once, inject_width_style(&once));
    }

    #[test]
    fn test_inject_width_style_without_match() {
        let markup = "<svg\nwidth=\"100\"></svg>";
        assert!(matches!(inject_width_style(markup), Cow::Borrowed(m) if m == markup));
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!("<div></div>", wrap(""));
    }

    #[test]
    fn test_filter_output_preamble_only() -> Result<()> {
        assert_eq!("<div></div>", filter_output(PREAMBLE)?);
        Ok(())
    }

    #[test]
    fn test_invocation_args_forces_svg() {
        assert_eq!(vec!["-s", "0.8", "--type", "svg"], invocation_args("-s 0.8"));
        assert_eq!(
            vec!["-s", "0.8", "--type", "svg"],
            invocation_args("-s 0.8 --type png"),
        );
        assert_eq!(vec!["--type", "svg"], invocation_args(""));
    }

    #[test]
    fn test_invocation_args_strips_every_type_spelling() {
        assert_eq!(
            vec!["--proportional", "-s", "2", "--type", "svg"],
            invocation_args("-t png --proportional --type=pdf -s 2 -tpng"),
        );
    }

    #[test]
    fn test_render() -> Result<()> {
        let html = fake("aafigure.sh").render(
            r#"<svg width="100" height="50"><rect/></svg>"#,
            "-s 0.8 --type png",
        )?;
        assert_eq!(
            "<div><svg style=\"width:100%\" width=\"100\" height=\"50\"><rect/></svg>\n</div>",
            html,
        );
        Ok(())
    }

    #[test]
    fn test_render_empty_source() -> Result<()> {
        assert_eq!("<div></div>", fake("aafigure.sh").render("", "")?);
        Ok(())
    }

    #[test]
    fn test_render_missing_program() {
        let renderer =
            Aafigure::new(vec!["./testdata/bin/no-such-aafigure".to_owned()]);
        match renderer.render("+--+\n|  |\n+--+\n", "") {
            Err(Error::Spawn { program, .. }) => {
                assert_eq!("./testdata/bin/no-such-aafigure", program)
            }
            other => panic!("wanted Spawn error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_short_output() {
        assert!(matches!(
            fake("short-output.sh").render("+--+", ""),
            Err(Error::MalformedOutput { lines: 1, .. })
        ));
    }

    #[test]
    fn test_render_failing_renderer() {
        match fake("failing.sh").render("+--+", "") {
            Err(Error::Failed { stderr, .. }) => {
                assert_eq!("aafigure: unsupported option", stderr)
            }
            other => panic!("wanted Failed error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_empty_command() {
        assert!(matches!(
            Aafigure::new(Vec::new()).render("", ""),
            Err(Error::EmptyCommand)
        ));
    }
}
