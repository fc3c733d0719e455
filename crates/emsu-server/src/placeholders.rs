//! Sample records shown on a dashboard whose feeds are still empty, so a
//! freshly provisioned school renders a populated page.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SampleGrade {
    pub id: &'static str,
    pub subject: &'static str,
    pub score: &'static str,
    pub date: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleEntry {
    pub time: &'static str,
    pub subject: &'static str,
    pub teacher: &'static str,
    pub room: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SampleAnnouncement {
    pub id: &'static str,
    pub title: &'static str,
    pub content: &'static str,
    pub date: &'static str,
    pub from: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: &'static str,
    pub details: &'static str,
    pub time: &'static str,
}

pub fn grades() -> Vec<SampleGrade> {
    vec![
        SampleGrade { id: "1", subject: "Mathematics", score: "85", date: "2024-01-20", kind: "Test" },
        SampleGrade { id: "2", subject: "English", score: "92", date: "2024-01-18", kind: "Assignment" },
        SampleGrade { id: "3", subject: "Physics", score: "78", date: "2024-01-15", kind: "Quiz" },
    ]
}

pub fn schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry { time: "8:00 AM", subject: "Mathematics", teacher: "Mr. Johnson", room: "Room 101" },
        ScheduleEntry { time: "9:00 AM", subject: "English", teacher: "Mrs. Smith", room: "Room 102" },
        ScheduleEntry { time: "10:00 AM", subject: "Physics", teacher: "Dr. Brown", room: "Lab 1" },
    ]
}

pub fn announcements() -> Vec<SampleAnnouncement> {
    vec![SampleAnnouncement {
        id: "1",
        title: "Midterm Exams Schedule Released",
        content: "The schedule for midterm examinations has been posted.",
        date: "2024-01-25",
        from: "Academic Office",
    }]
}

pub fn activities() -> Vec<Activity> {
    vec![
        Activity {
            kind: "grade",
            title: "New grade posted",
            details: "Chemistry Lab Report - 88%",
            time: "2 hours ago",
        },
        Activity {
            kind: "assignment",
            title: "Assignment submitted",
            details: "Physics Problem Set",
            time: "1 day ago",
        },
    ]
}
