use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use course_tracker::api::CatalogApi;
use course_tracker::api::http::HttpApi;
use course_tracker::config::Config;
use course_tracker::entity::{EntityId, EntityKey};
use course_tracker::progress::Deadline;
use course_tracker::tracker::Tracker;
use course_tracker::utils::init_log;
use course_tracker::view::notice::{NoticeReceiver, drain, notice_channel};
use course_tracker::view::{Row, ViewState};

#[derive(Debug, Parser)]
#[command(author, version, about = "Track course reading and assignment progress")]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `api_base` from the config
    #[arg(long)]
    api_base: Option<String>,

    /// Value of the backend session cookie
    #[arg(long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the books, articles and assignments of a course
    Show { course: i64 },
    /// Add or remove a chapter from a book's completed set
    ToggleChapter(ChapterArgs),
    /// Flip the completion of one chapter pill
    CompleteChapter(ChapterArgs),
    ToggleArticle(ItemArgs),
    ToggleAssignment(ItemArgs),
    /// Set or clear a deadline
    Deadline(DeadlineArgs),
    Delete(DeleteArgs),
    AddBook {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        chapters: String,
        #[arg(long)]
        location: Option<String>,
    },
    AddArticle {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        location: Option<String>,
    },
    AddAssignment {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List your courses, or every course with `--all`
    Courses {
        university: String,
        #[arg(long)]
        all: bool,
    },
    Enroll { university: String, course: i64 },
    Leave { university: String, course: i64 },
    Universities,
    JoinUniversity { university: String },
    /// Show the calendar subscription, optionally issuing a new token
    Calendar {
        #[arg(long)]
        rotate: bool,
    },
}

#[derive(Debug, Args)]
struct ChapterArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    book: i64,
    #[arg(long)]
    chapter: i64,
}

#[derive(Debug, Args)]
struct ItemArgs {
    #[arg(long)]
    course: i64,
    id: i64,
}

#[derive(Debug, Args)]
struct DeadlineArgs {
    #[arg(long)]
    course: i64,
    #[arg(long)]
    article: Option<i64>,
    #[arg(long)]
    assignment: Option<i64>,
    #[arg(long, requires = "chapter")]
    book: Option<i64>,
    #[arg(long)]
    chapter: Option<u32>,
    /// Local date, `YYYY-MM-DD`
    #[arg(long, required_unless_present = "clear")]
    date: Option<String>,
    /// Local hour of the day
    #[arg(long, default_value_t = 23)]
    hour: i64,
    #[arg(long, conflicts_with = "date")]
    clear: bool,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    book: Option<i64>,
    #[arg(long)]
    article: Option<i64>,
    #[arg(long)]
    assignment: Option<i64>,
}

fn id(raw: i64) -> anyhow::Result<EntityId> {
    Ok(EntityId::new(raw)?)
}

fn form(pairs: &[(&str, Option<&str>)]) -> HashMap<String, String> {
    pairs
        .iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
        .collect()
}

fn print_course(view: &ViewState, course: EntityId) {
    for (key, row) in view.rows_for_course(course) {
        match row {
            Row::Book(book) => {
                println!("{key}: {} ({})", book.title, book.meta());
                let pills: Vec<String> = book
                    .chapters
                    .values()
                    .map(|p| {
                        let mark = match (p.completed, p.deadline.is_past()) {
                            (true, _) => "x",
                            (false, true) => "!",
                            (false, false) => " ",
                        };
                        format!("[{mark}]{}", p.index)
                    })
                    .collect();
                println!("    {}", pills.join(" "));
            }
            Row::Item(item) => {
                let mark = if item.completed { "x" } else { " " };
                let past = if !item.completed && item.deadline.is_past() { " (past)" } else { "" };
                println!(
                    "[{mark}] {key}: {} ({}) {}{past}",
                    item.title,
                    item.meta,
                    item.deadline.label()
                );
            }
        }
    }
}

fn print_notices(rx: &mut NoticeReceiver) {
    for notice in drain(rx) {
        eprintln!("{notice}");
    }
}

async fn run(tracker: &Tracker<HttpApi>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Show { course } => {
            let course = id(course)?;
            tracker.load_course(course).await?;
            print_course(tracker.view(), course);
        }
        Command::ToggleChapter(args) => {
            let course = id(args.course)?;
            tracker.load_books(course).await?;
            let set = tracker.toggle_book_chapter(id(args.book)?, args.chapter).await?;
            let list: Vec<String> = set.iter().map(|i| i.to_string()).collect();
            println!("completed chapters: [{}]", list.join(", "));
        }
        Command::CompleteChapter(args) => {
            tracker.load_books(id(args.course)?).await?;
            let index = u32::try_from(args.chapter)?;
            let completed = tracker.toggle_chapter(id(args.book)?, index).await?;
            println!("chapter {index} completed: {completed}");
        }
        Command::ToggleArticle(args) => {
            tracker.load_articles(id(args.course)?).await?;
            println!("completed: {}", tracker.toggle_article(id(args.id)?).await?);
        }
        Command::ToggleAssignment(args) => {
            tracker.load_assignments(id(args.course)?).await?;
            println!("completed: {}", tracker.toggle_assignment(id(args.id)?).await?);
        }
        Command::Deadline(args) => {
            tracker.load_course(id(args.course)?).await?;
            let entity = match (args.article, args.assignment, args.book, args.chapter) {
                (Some(a), _, _, _) => EntityKey::Article(id(a)?),
                (_, Some(a), _, _) => EntityKey::Assignment(id(a)?),
                (_, _, Some(book), Some(index)) => EntityKey::Chapter { book: id(book)?, index },
                _ => anyhow::bail!("choose --article, --assignment or --book with --chapter"),
            };
            let deadline = match (&args.date, args.clear) {
                (_, true) | (None, _) => Deadline::NONE,
                (Some(date), false) => Deadline::from_local_date(date, args.hour)?,
            };
            let after = tracker.set_deadline(entity, deadline).await?;
            println!("{entity}: {}", after.label());
        }
        Command::Delete(args) => match (args.book, args.article, args.assignment) {
            (Some(b), _, _) => tracker.delete_book(id(b)?).await?,
            (_, Some(a), _) => tracker.delete_article(id(a)?).await?,
            (_, _, Some(a)) => tracker.delete_assignment(id(a)?).await?,
            _ => anyhow::bail!("choose --book, --article or --assignment"),
        },
        Command::AddBook {
            course,
            title,
            author,
            chapters,
            location,
        } => {
            let inputs = form(&[
                ("title", Some(title.as_str())),
                ("author", Some(author.as_str())),
                ("numChapters", Some(chapters.as_str())),
                ("location", location.as_deref()),
            ]);
            let book = tracker.create_book(id(course)?, &inputs).await?;
            println!("created book {}", book.id);
        }
        Command::AddArticle {
            course,
            title,
            author,
            location,
        } => {
            let inputs = form(&[
                ("title", Some(title.as_str())),
                ("author", Some(author.as_str())),
                ("location", location.as_deref()),
            ]);
            let article = tracker.create_article(id(course)?, &inputs).await?;
            println!("created article {}", article.id);
        }
        Command::AddAssignment {
            course,
            title,
            description,
        } => {
            let inputs = form(&[("title", Some(title.as_str())), ("description", description.as_deref())]);
            let assignment = tracker.create_assignment(id(course)?, &inputs).await?;
            println!("created assignment {}", assignment.id);
        }
        Command::Courses { university, all } => {
            let courses = if all {
                tracker.api().course_catalog(&university).await?
            } else {
                tracker.api().my_courses(&university).await?
            };
            for c in courses {
                println!("{}: {} {} ({} term {})", c.id, c.code, c.name, c.year, c.term);
            }
        }
        Command::Enroll { university, course } => {
            let course = find_course(tracker, &university, id(course)?).await?;
            tracker.enroll(&course).await?;
        }
        Command::Leave { university, course } => {
            let course = find_course(tracker, &university, id(course)?).await?;
            tracker.leave_course(&course).await?;
        }
        Command::Universities => {
            let mine = tracker.api().my_universities().await?;
            for u in tracker.api().universities().await? {
                let member = mine.iter().any(|m| m.university_id == u.id);
                println!("{}{}: {}", if member { "* " } else { "  " }, u.id, u.name);
            }
        }
        Command::JoinUniversity { university } => {
            let membership = tracker.api().join_university(&university).await?;
            println!("joined {}", membership.university_id);
        }
        Command::Calendar { rotate } => {
            let token = if rotate {
                Some(tracker.api().rotate_calendar_token().await?)
            } else {
                tracker.api().calendar_token().await?
            };
            match token {
                Some(token) => println!("{}{}", tracker.api().base().trim_end_matches("/api"), token.url_path),
                None => println!("not signed in"),
            }
        }
    }
    Ok(())
}

async fn find_course(
    tracker: &Tracker<HttpApi>,
    university: &str,
    course: EntityId,
) -> anyhow::Result<course_tracker::models::Course> {
    tracker
        .api()
        .course_catalog(university)
        .await?
        .into_iter()
        .find(|c| c.id == course)
        .ok_or_else(|| anyhow::anyhow!("course {course} not found in {university}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base) = cli.api_base {
        config.api_base = base;
    }
    if let Some(session) = cli.session {
        config.session = Some(session);
    }
    let _guard = init_log(config.log_dir.clone())?;
    tracing::info!(api = %config.api_base, serialize = config.serialize_toggles, "starting");

    let api = HttpApi::from_config(&config)?;
    let view = Arc::new(ViewState::default());
    let (notices, mut rx) = notice_channel();
    let tracker = Tracker::new(api, view, notices, config.serialize_toggles);

    let result = run(&tracker, cli.command).await;
    print_notices(&mut rx);
    result
}
