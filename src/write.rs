//! The page renderer. Builds the template context for every output page from
//! the [`Site`] and writes the rendered HTML to disk. See [`Renderer`].

use crate::page::Page;
use crate::site::Site;
use gtmpl::{Context, Template, Value};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Responsible for templating the site's pages and index pages and writing
/// them to disk.
pub struct Renderer<'a> {
    /// The site being rendered.
    pub site: &'a Site,

    /// The template for content pages.
    pub page_template: &'a Template,

    /// The template for index pages.
    pub index_template: &'a Template,

    /// The base URL for index pages. The index pages will be located at
    /// `{index_url}/index.html`, `{index_url}/1.html`, etc.
    pub index_url: &'a Url,

    /// The directory in which the index HTML files will be written, as
    /// `{index_output_directory}/index.html`,
    /// `{index_output_directory}/1.html`, etc.
    pub index_output_directory: &'a Path,

    /// The number of posts per index page.
    pub index_page_size: usize,

    /// The URL for the site's home page. This is made available to every
    /// template, typically as the destination for the site-header link.
    pub home_page: &'a Url,

    /// The URL for the static assets. This is made available to every
    /// template, typically for the theme's stylesheet.
    pub static_url: &'a Url,
}

impl<'a> Renderer<'a> {
    /// Renders a single page of the site into a complete HTML document.
    /// Posts link to their neighbours in date order.
    pub fn render_page(&self, page: &Page) -> Result<String> {
        let posts = self.site.posts();
        let output = match posts.iter().position(|post| post.id == page.id) {
            Some(i) => self.page_output(page, &posts, i),
            None => self.standalone_output(page),
        };
        let mut buf = Vec::new();
        self.execute(&output, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Renders every page and index page and writes them to disk, creating
    /// directories as needed.
    pub fn write_site(&self) -> Result<()> {
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let outputs = self.outputs();
        for output in &outputs {
            if let Some(dir) = output.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir)?;
                }
            }
            debug!(path:? = output.file_path; "writing page");
            self.execute(output, &mut std::fs::File::create(&output.file_path)?)?;
        }
        info!(pages = outputs.len(); "wrote pages");
        Ok(())
    }

    fn execute<W: io::Write>(&self, output: &OutputPage, w: &mut W) -> Result<()> {
        let context = Context::from(self.context(output))?;
        output.template.execute(w, &context)?;
        Ok(())
    }

    /// Builds the template context for an output page. The result is a
    /// [`Value::Object`] with fields:
    ///
    /// * `title`: the document title (see [`Site::page_title`])
    /// * `site`: the site parameters (see [`Site::to_value`])
    /// * `item`: the page (see [`Page::to_value`]) or, for index pages, the
    ///   list of post summaries (see [`Page::summarize`])
    /// * `prev`, `next`: the neighbouring pages' URLs, or nil
    /// * `nav`: links to the `main` pages
    /// * `pinned`: links to the pinned pages
    /// * `alternates`: the alternate output formats
    /// * `diagram_script`: the client-side diagram script URL if this page
    ///   needs it, nil otherwise
    /// * `home_page`, `static_url`
    fn context(&self, output: &OutputPage) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "title".to_owned(),
            Value::String(self.site.page_title(&output.title)),
        );
        m.insert("site".to_owned(), self.site.to_value());
        m.insert("item".to_owned(), output.item.clone());
        m.insert("prev".to_owned(), option_to_value(&output.prev));
        m.insert("next".to_owned(), option_to_value(&output.next));
        m.insert(
            "nav".to_owned(),
            Value::Array(self.site.navigation().map(Page::link).collect()),
        );
        m.insert(
            "pinned".to_owned(),
            Value::Array(self.site.pinned().into_iter().map(Page::link).collect()),
        );
        m.insert(
            "alternates".to_owned(),
            Value::Array(self.site.alternates().iter().map(|f| f.to_value()).collect()),
        );
        m.insert(
            "diagram_script".to_owned(),
            match output.uses_client_diagrams {
                true => option_to_value(&self.site.diagram_script),
                false => Value::Nil,
            },
        );
        m.insert(
            "home_page".to_owned(),
            Value::String(self.home_page.to_string()),
        );
        m.insert(
            "static_url".to_owned(),
            Value::String(self.static_url.to_string()),
        );
        Value::Object(m)
    }

    /// Creates every [`OutputPage`]: one per post (linked to its neighbours
    /// in date order), one per other page, and the index pages.
    fn outputs(&self) -> Vec<OutputPage<'a>> {
        let posts = self.site.posts();
        let mut outputs: Vec<OutputPage<'a>> = posts
            .iter()
            .enumerate()
            .map(|(i, post)| self.page_output(post, &posts, i))
            .collect();
        outputs.extend(
            self.site
                .pages
                .iter()
                .filter(|page| !page.is_post())
                .map(|page| self.standalone_output(page)),
        );
        outputs.extend(self.index_outputs(&posts));
        outputs
    }

    fn page_output(&self, page: &Page, posts: &[&Page], i: usize) -> OutputPage<'a> {
        OutputPage {
            title: page.title.clone(),
            item: page.to_value(),
            file_path: page.file_path.clone(),
            prev: match i < 1 {
                true => None,
                false => Some(posts[i - 1].url.clone()),
            },
            next: posts.get(i + 1).map(|next| next.url.clone()),
            uses_client_diagrams: page.uses_client_diagrams,
            template: self.page_template,
        }
    }

    fn standalone_output(&self, page: &Page) -> OutputPage<'a> {
        OutputPage {
            title: page.title.clone(),
            item: page.to_value(),
            file_path: page.file_path.clone(),
            prev: None,
            next: None,
            uses_client_diagrams: page.uses_client_diagrams,
            template: self.page_template,
        }
    }

    /// Paginates the posts into index pages of `index_page_size` posts each.
    /// There is always at least one index page, even with no posts.
    fn index_outputs(&self, posts: &[&Page]) -> Vec<OutputPage<'a>> {
        let index_page_size = self.index_page_size.max(1);
        let total_pages = std::cmp::max(1, (posts.len() + index_page_size - 1) / index_page_size);
        let index_file = |i: usize| match i {
            0 => String::from("index.html"),
            _ => format!("{}.html", i),
        };
        let index_page_url = |i: usize| self.index_url.join(&index_file(i)).ok();

        (0..total_pages)
            .map(|i| {
                let start = (i * index_page_size).min(posts.len());
                let chunk = &posts[start..(start + index_page_size).min(posts.len())];
                OutputPage {
                    title: self.site.title.clone(),
                    item: Value::Array(chunk.iter().map(|p| p.summarize()).collect()),
                    file_path: self.index_output_directory.join(index_file(i)),
                    prev: match i {
                        0 => None,
                        _ => index_page_url(i - 1),
                    },
                    next: match i + 1 < total_pages {
                        false => None,
                        true => index_page_url(i + 1),
                    },
                    uses_client_diagrams: chunk.iter().any(|p| p.uses_client_diagrams),
                    template: self.index_template,
                }
            })
            .collect()
    }
}

/// An object representing an output HTML file.
struct OutputPage<'t> {
    /// The page title, before the site title is added.
    title: String,

    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The URL for the previous page, if any.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// Whether the page needs the client-side diagram script.
    uses_client_diagrams: bool,

    /// The template with which the page will be rendered.
    template: &'t Template,
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => write!(f, "rendering template: {}", err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::page::{testing::page, MAIN_KIND, POST_KIND};
    use crate::site::{testing::site, OutputFormat};
    use crate::taxonomy::{PINNED, PINNED_TERM};

    const PAGE_TEMPLATE: &str = concat!(
        "<title>{{ .title }}</title>",
        "{{ range .alternates }}",
        "<link rel=\"{{ .rel }}\" type=\"{{ .mime_type }}\" href=\"{{ .url }}\">",
        "{{ end }}",
        "{{ if .diagram_script }}<script src=\"{{ .diagram_script }}\"></script>{{ end }}",
        "<nav>{{ range .nav }}<a href=\"{{ .url }}\">{{ .title }}</a>{{ end }}</nav>",
        "<aside>{{ range .pinned }}<a href=\"{{ .url }}\">{{ .title }}</a>{{ end }}</aside>",
        "<p>{{ .site.description }}</p>",
        "<main>{{ .item.body }}</main>",
        "{{ if .prev }}<a rel=\"prev\" href=\"{{ .prev }}\"></a>{{ end }}",
        "{{ if .next }}<a rel=\"next\" href=\"{{ .next }}\"></a>{{ end }}",
    );

    const INDEX_TEMPLATE: &str = concat!(
        "{{ range .item }}<article>{{ .title }}</article>{{ end }}",
        "{{ if .prev }}<a rel=\"prev\" href=\"{{ .prev }}\"></a>{{ end }}",
        "{{ if .next }}<a rel=\"next\" href=\"{{ .next }}\"></a>{{ end }}",
    );

    fn template(contents: &str) -> Template {
        let mut template = Template::default();
        template.parse(contents).expect("valid test template");
        template
    }

    struct Fixture {
        site: Site,
        page_template: Template,
        index_template: Template,
        index_url: Url,
        home_page: Url,
        static_url: Url,
        output_directory: PathBuf,
    }

    impl Fixture {
        fn new(site: Site, output_directory: &Path) -> Fixture {
            let root = site.base_url.clone();
            Fixture {
                site,
                page_template: template(PAGE_TEMPLATE),
                index_template: template(INDEX_TEMPLATE),
                index_url: root.join("pages/").expect("valid url"),
                home_page: root.join("pages/index.html").expect("valid url"),
                static_url: root.join("static/").expect("valid url"),
                output_directory: output_directory.join("pages"),
            }
        }

        fn renderer(&self) -> Renderer<'_> {
            Renderer {
                site: &self.site,
                page_template: &self.page_template,
                index_template: &self.index_template,
                index_url: &self.index_url,
                index_output_directory: &self.output_directory,
                index_page_size: 2,
                home_page: &self.home_page,
                static_url: &self.static_url,
            }
        }
    }

    fn post(id: &str, date: &str) -> Page {
        let mut p = page(id, &id.to_uppercase(), POST_KIND);
        p.date = Some(date.to_owned());
        p.body = format!("<p>{}</p>", id);
        p
    }

    fn blog() -> Site {
        let mut ownership = post("ownership", "2021-04-16");
        ownership.taxonomies.insert(PINNED, PINNED_TERM);
        ownership.weight = 5;
        let mut traits = post("traits", "2021-06-02");
        traits.uses_client_diagrams = true;
        let mut effects = post("effects", "2021-09-09");
        effects.taxonomies.insert(PINNED, PINNED_TERM);
        effects.weight = 1;

        let mut site = site(vec![
            page("about", "About", MAIN_KIND),
            ownership,
            page("projects", "Projects", MAIN_KIND),
            page("colophon", "Colophon", "note"),
            traits,
            page("contact", "Contact", MAIN_KIND),
            effects,
        ]);
        site.diagram_script =
            Some(Url::parse("https://cdn.example.org/mermaid.min.js").expect("valid url"));
        site.alternates = vec![OutputFormat {
            name: "atom".to_owned(),
            rel: "alternate".to_owned(),
            mime_type: "application/atom+xml".to_owned(),
            url: Url::parse("https://example.org/feed.atom").expect("valid url"),
        }];
        site
    }

    #[test]
    fn test_render_page() -> Result<()> {
        let fixture = Fixture::new(blog(), Path::new("/tmp/quire-out"));
        let about = &fixture.site.pages[0];
        let html = fixture.renderer().render_page(about)?;
        assert_eq!(
            concat!(
                "<title>About · Notes on Languages</title>",
                "<link rel=\"alternate\" type=\"application/atom+xml\" ",
                "href=\"https://example.org/feed.atom\">",
                "<nav>",
                "<a href=\"https://example.org/about.html\">About</a>",
                "<a href=\"https://example.org/projects.html\">Projects</a>",
                "<a href=\"https://example.org/contact.html\">Contact</a>",
                "</nav>",
                "<aside>",
                "<a href=\"https://example.org/effects.html\">EFFECTS</a>",
                "<a href=\"https://example.org/ownership.html\">OWNERSHIP</a>",
                "</aside>",
                "<p></p>",
                "<main></main>",
            ),
            html
        );
        Ok(())
    }

    #[test]
    fn test_render_page_title_matches_site() -> Result<()> {
        let fixture = Fixture::new(
            site(vec![page("home", "Notes on Languages", MAIN_KIND)]),
            Path::new("/tmp/quire-out"),
        );
        let html = fixture.renderer().render_page(&fixture.site.pages[0])?;
        assert!(html.starts_with("<title>Notes on Languages</title>"));
        Ok(())
    }

    #[test]
    fn test_render_page_diagram_script_only_when_needed() -> Result<()> {
        let fixture = Fixture::new(blog(), Path::new("/tmp/quire-out"));
        let renderer = fixture.renderer();
        let script = "<script src=\"https://cdn.example.org/mermaid.min.js\"></script>";

        let traits = &fixture.site.pages[4];
        assert_eq!(1, renderer.render_page(traits)?.matches(script).count());

        let ownership = &fixture.site.pages[1];
        assert!(!renderer.render_page(ownership)?.contains("<script"));
        Ok(())
    }

    #[test]
    fn test_render_post_neighbours() -> Result<()> {
        let fixture = Fixture::new(blog(), Path::new("/tmp/quire-out"));
        let traits = &fixture.site.pages[4];
        let html = fixture.renderer().render_page(traits)?;
        assert!(html.contains("<main><p>traits</p></main>"));
        assert!(html.contains("<a rel=\"prev\" href=\"https://example.org/effects.html\"></a>"));
        assert!(html.contains("<a rel=\"next\" href=\"https://example.org/ownership.html\"></a>"));
        Ok(())
    }

    #[test]
    fn test_index_outputs() {
        let fixture = Fixture::new(blog(), Path::new("/tmp/quire-out"));
        let renderer = fixture.renderer();
        let posts = fixture.site.posts();
        let outputs = renderer.index_outputs(&posts);

        let files: Vec<PathBuf> = outputs.iter().map(|o| o.file_path.clone()).collect();
        assert_eq!(
            vec![
                PathBuf::from("/tmp/quire-out/pages/index.html"),
                PathBuf::from("/tmp/quire-out/pages/1.html"),
            ],
            files
        );
        assert_eq!(None, outputs[0].prev);
        assert_eq!(
            Some("https://example.org/pages/1.html"),
            outputs[0].next.as_ref().map(Url::as_str)
        );
        assert_eq!(
            Some("https://example.org/pages/index.html"),
            outputs[1].prev.as_ref().map(Url::as_str)
        );
        assert_eq!(None, outputs[1].next);
        assert!(outputs[0].uses_client_diagrams);
        assert!(!outputs[1].uses_client_diagrams);
    }

    #[test]
    fn test_index_outputs_without_posts() {
        let fixture = Fixture::new(
            site(vec![page("about", "About", MAIN_KIND)]),
            Path::new("/tmp/quire-out"),
        );
        let outputs = fixture.renderer().index_outputs(&[]);
        assert_eq!(1, outputs.len());
        assert_eq!(None, outputs[0].next);
    }

    #[test]
    fn test_write_site() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut site = blog();
        for page in site.pages.iter_mut() {
            page.file_path = dir.path().join(format!("{}.html", page.id));
        }
        let fixture = Fixture::new(site, dir.path());
        fixture.renderer().write_site()?;

        for id in ["about", "ownership", "colophon", "traits", "effects"] {
            assert!(dir.path().join(format!("{}.html", id)).is_file(), "{} missing", id);
        }
        let index = std::fs::read_to_string(dir.path().join("pages/index.html"))?;
        assert_eq!(
            concat!(
                "<article>EFFECTS</article><article>TRAITS</article>",
                "<a rel=\"next\" href=\"https://example.org/pages/1.html\"></a>",
            ),
            index
        );
        assert!(dir.path().join("pages/1.html").is_file());
        Ok(())
    }
}
