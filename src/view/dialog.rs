use std::collections::{BTreeMap, HashMap, HashSet};

use crate::entity::EntityId;
use crate::error::{Error, Result};
use crate::models::{NewArticle, NewAssignment, NewBook, NewCourse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Int,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogField {
    pub label: String,
    pub name: String,
    pub kind: InputKind,
    pub required: bool,
    pub placeholder: Option<String>,
    pub initial: Option<String>,
}

impl DialogField {
    pub fn text(label: &str, name: &str) -> Self {
        Self {
            label: label.to_string(),
            name: name.to_string(),
            kind: InputKind::Text,
            required: false,
            placeholder: None,
            initial: None,
        }
    }

    pub fn int(label: &str, name: &str) -> Self {
        Self {
            kind: InputKind::Int,
            ..Self::text(label, name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn initial(mut self, initial: impl ToString) -> Self {
        self.initial = Some(initial.to_string());
        self
    }
}

/// What to ask the user. A single renderer decides how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub submit_label: String,
    pub cancel_label: String,
    pub fields: Vec<DialogField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Int(i64),
    Text(String),
}

/// Parsed submission, keyed by field name. Empty optional fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData(BTreeMap<String, FormValue>);

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FormValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(FormValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    fn required_text(&self, name: &str) -> Result<String> {
        self.text(name)
            .map(str::to_string)
            .ok_or_else(|| Error::validation(format!("{name} is required")))
    }

    fn required_int(&self, name: &str) -> Result<i64> {
        self.int(name)
            .ok_or_else(|| Error::validation(format!("{name} is required")))
    }
}

impl Dialog {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            submit_label: "Submit".to_string(),
            cancel_label: "Cancel".to_string(),
            fields: Vec::new(),
        }
    }

    pub fn submit_label(mut self, label: &str) -> Self {
        self.submit_label = label.to_string();
        self
    }

    pub fn field(mut self, field: DialogField) -> Self {
        self.fields.push(field);
        self
    }

    /// A dialog needs at least one field, every field a label and a unique name.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::validation(format!("dialog {:?} has no fields", self.title)));
        }
        let mut names = HashSet::new();
        for f in &self.fields {
            if f.label.trim().is_empty() || f.name.trim().is_empty() {
                return Err(Error::validation("dialog fields need a label and a name"));
            }
            if !names.insert(f.name.as_str()) {
                return Err(Error::validation(format!("duplicate dialog field {:?}", f.name)));
            }
        }
        Ok(())
    }

    /// Apply the submit contract to raw input values.
    pub fn parse(&self, inputs: &HashMap<String, String>) -> Result<FormData> {
        self.validate()?;
        let mut data = BTreeMap::new();
        for f in &self.fields {
            let raw = inputs.get(&f.name).map(|s| s.trim()).unwrap_or("");
            if raw.is_empty() {
                if f.required {
                    return Err(Error::validation(format!("{} is required", f.label)));
                }
                continue;
            }
            let value = match f.kind {
                InputKind::Int => FormValue::Int(
                    raw.parse()
                        .map_err(|_| Error::validation(format!("{} must be a whole number", f.label)))?,
                ),
                InputKind::Text => FormValue::Text(raw.to_string()),
            };
            data.insert(f.name.clone(), value);
        }
        Ok(FormData(data))
    }

    pub fn create_book() -> Self {
        Dialog::new("Create a book")
            .submit_label("Create")
            .field(
                DialogField::text("Title", "title")
                    .required()
                    .placeholder("e.g., Operating Systems: Three Easy Pieces"),
            )
            .field(
                DialogField::text("Author", "author")
                    .required()
                    .placeholder("e.g., Remzi Arpaci-Dusseau"),
            )
            .field(DialogField::int("Chapters", "numChapters").required().placeholder("e.g., 15"))
            .field(DialogField::text("Location (optional)", "location").placeholder("e.g., Library shelf A4"))
    }

    pub fn create_article() -> Self {
        Dialog::new("Add an article")
            .submit_label("Create")
            .field(DialogField::text("Title", "title").required())
            .field(DialogField::text("Author", "author").required())
            .field(DialogField::text("Location (optional)", "location").placeholder("e.g., URL or DOI"))
    }

    pub fn create_assignment() -> Self {
        Dialog::new("Add an assignment")
            .submit_label("Create")
            .field(DialogField::text("Title", "title").required())
            .field(DialogField::text("Description (optional)", "description"))
    }

    pub fn create_course(current_year: i32) -> Self {
        Dialog::new("Create a course")
            .submit_label("Create")
            .field(DialogField::int("Year", "year").required().initial(current_year))
            .field(DialogField::int("Term", "term").required().placeholder("e.g., 1"))
            .field(DialogField::text("Code", "code").required().placeholder("e.g., TDT4100"))
            .field(DialogField::text("Name", "name").required())
    }
}

pub fn new_book(course: EntityId, form: &FormData) -> Result<NewBook> {
    let chapters = form.required_int("numChapters")?;
    let num_chapters = u32::try_from(chapters)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::validation("Chapters must be a positive integer"))?;
    Ok(NewBook {
        course_id: course,
        title: form.required_text("title")?,
        author: form.required_text("author")?,
        num_chapters,
        location: form.text("location").map(str::to_string),
    })
}

pub fn new_article(course: EntityId, form: &FormData) -> Result<NewArticle> {
    Ok(NewArticle {
        course_id: course,
        title: form.required_text("title")?,
        author: form.required_text("author")?,
        location: form.text("location").map(str::to_string),
    })
}

pub fn new_assignment(course: EntityId, form: &FormData) -> Result<NewAssignment> {
    Ok(NewAssignment {
        course_id: course,
        title: form.required_text("title")?,
        description: form.text("description").map(str::to_string),
    })
}

pub fn new_course(university: &str, form: &FormData) -> Result<NewCourse> {
    if university.trim().is_empty() {
        return Err(Error::validation("Cannot create: missing university context"));
    }
    let year = form.required_int("year")?;
    if year < 1900 {
        return Err(Error::validation("Please enter a realistic year (>= 1900)"));
    }
    let term = form.required_int("term")?;
    if term <= 0 {
        return Err(Error::validation("Term must be a positive number"));
    }
    Ok(NewCourse {
        university_id: university.to_string(),
        year,
        term,
        code: form.required_text("code")?,
        name: form.required_text("name")?,
    })
}
