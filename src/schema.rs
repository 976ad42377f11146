// Diesel table definitions for the local SQLite store.
// Kept in sync with the CREATE TABLE batch in repository::init_schema.

diesel::table! {
    companies (id) {
        id -> Integer,
        owner_id -> BigInt,
        company_name -> Text,
        industry -> Text,
        city -> Text,
        schedule -> Text,
        salary -> Text,
        communication_style -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    vacancies (id) {
        id -> Integer,
        owner_id -> BigInt,
        title -> Text,
        query -> Text,
        experience_required -> Integer,
        schedule -> Text,
        salary_min -> Nullable<BigInt>,
        salary_max -> Nullable<BigInt>,
        critical_requirements -> Text,
        status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    candidates (id) {
        id -> Integer,
        vacancy_id -> Integer,
        name -> Text,
        source -> Text,
        city -> Text,
        skills -> Text,
        ai_score -> Integer,
        ai_verdict -> Text,
        status -> Text,
        is_favorite -> Integer,
        external_posting_id -> Nullable<Integer>,
        created_at -> Text,
    }
}

diesel::table! {
    candidate_status_history (id) {
        id -> Integer,
        candidate_id -> Integer,
        old_status -> Text,
        new_status -> Text,
        changed_at -> Text,
    }
}

diesel::table! {
    external_postings (id) {
        id -> Integer,
        source -> Text,
        source_id -> Nullable<Text>,
        title -> Text,
        company -> Nullable<Text>,
        salary -> Text,
        city -> Text,
        url -> Text,
        description -> Text,
        requirements -> Text,
        published -> Text,
        owner_id -> BigInt,
        status -> Text,
        collected_at -> Text,
        ai_analysis -> Text,
        raw_payload -> Text,
    }
}

diesel::table! {
    monitoring_settings (id) {
        id -> Integer,
        owner_id -> BigInt,
        city -> Text,
        keywords -> Text,
        interval_minutes -> Integer,
        is_active -> Integer,
        sources -> Text,
        last_check -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(candidates -> vacancies (vacancy_id));
diesel::joinable!(candidate_status_history -> candidates (candidate_id));

diesel::allow_tables_to_appear_in_same_query!(
    companies,
    vacancies,
    candidates,
    candidate_status_history,
    external_postings,
    monitoring_settings,
);
