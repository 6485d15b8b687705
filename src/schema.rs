/**
 * Table definitions for the PostgreSQL store.
 *
 * Every statement is idempotent so they can be applied on each startup.
 */
pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS questions (
        id SERIAL PRIMARY KEY,
        text TEXT NOT NULL,
        published_at TIMESTAMPTZ NOT NULL,
        ends_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS choices (
        id SERIAL PRIMARY KEY,
        question_id INT4 NOT NULL REFERENCES questions (id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        UNIQUE (id, question_id)
    )",
    // A vote's question always matches its choice's question, and a voter
    // holds at most one vote per question
    "CREATE TABLE IF NOT EXISTS votes (
        id SERIAL PRIMARY KEY,
        voter TEXT NOT NULL,
        question_id INT4 NOT NULL,
        choice_id INT4 NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        FOREIGN KEY (choice_id, question_id) REFERENCES choices (id, question_id) ON DELETE CASCADE,
        UNIQUE (voter, question_id)
    )",
    "CREATE INDEX IF NOT EXISTS questions_published_at ON questions (published_at DESC)",
];
