use std::collections::HashSet;

use crate::error::GpaError;
use crate::models::SubjectGroup;

pub const DEFAULT_NON_CREDIT: [&str; 6] = [
    "MAT1142", "ICT1B13", "ENG1201", "ICT2B13", "ENG2201", "ENG3B10",
];

const GROUP_PREFIXES: [(&str, SubjectGroup); 9] = [
    ("AMT", SubjectGroup::Mathematics),
    ("IMT", SubjectGroup::Mathematics),
    ("MAT", SubjectGroup::Mathematics),
    ("CHE", SubjectGroup::Chemistry),
    ("PHY", SubjectGroup::Physics),
    ("ZOO", SubjectGroup::Zoology),
    ("BOT", SubjectGroup::Botany),
    ("COM", SubjectGroup::ComputerScience),
    ("CSC", SubjectGroup::ComputerScience),
];

#[derive(Debug, Clone)]
pub struct SubjectClassifier {
    non_credit: HashSet<String>,
}

impl SubjectClassifier {
    pub fn new<I, S>(non_credit: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            non_credit: non_credit.into_iter().map(Into::into).collect(),
        }
    }

    /// Credit weight encoded in the trailing character of the subject id.
    ///
    /// `Ok(None)` means the subject is non-credit and must be skipped entirely.
    pub fn credit_weight(&self, subject_id: &str) -> Result<Option<f64>, GpaError> {
        if self.non_credit.contains(subject_id) {
            return Ok(None);
        }

        let weight = match subject_id.chars().last() {
            Some(digit @ '0'..='6') => f64::from(digit as u8 - b'0'),
            Some('α') => 1.5,
            Some('β') => 2.5,
            Some('δ') => 1.25,
            _ => {
                return Err(GpaError::UnclassifiableSubject {
                    subject: subject_id.to_owned(),
                })
            }
        };

        Ok(Some(weight))
    }

    pub fn group_for(&self, subject_id: &str) -> SubjectGroup {
        GROUP_PREFIXES
            .iter()
            .find(|(prefix, _)| subject_id.starts_with(prefix))
            .map_or(SubjectGroup::Ungrouped, |(_, group)| *group)
    }
}

impl Default for SubjectClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NON_CREDIT)
    }
}
