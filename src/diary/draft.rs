/// The not-yet-submitted entry. Field updates carry no validation; content is
/// only checked when the draft is submitted to the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiaryDraft {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Content,
}

impl DiaryDraft {
    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        match field {
            DraftField::Title => self.title = value.into(),
            DraftField::Content => self.content = value.into(),
        }
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.content.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}
