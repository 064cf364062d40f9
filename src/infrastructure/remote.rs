use api_client::{
    model::{self as wire, Fields, Value},
    CatalogClient, DocumentClient, IdentityClient,
};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    core::model::{Book, BookId, BookInfo, BookPatch, Candidate, User, UserId, UserProfile},
    error::{Error, Result},
    infrastructure::{BookCatalog, DocumentStore, IdentityProvider, SignInMethods},
};

/// Field names as the documents have always been written.
mod field {
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const COVER_IMAGE: &str = "coverImage";
    pub const STATUS: &str = "status";
    pub const START_TIME: &str = "startTime";
    pub const TOTAL_TIME: &str = "totalTime";
    pub const FINISHED_AT: &str = "finishedAt";
    pub const TOTAL_READERS: &str = "totalReaders";

    pub const UID: &str = "uid";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
}

const BOOKS_COLLECTION: &str = "books";
const READERS_ALIAS: &str = "readers";

#[derive(Clone)]
pub struct RemoteDocuments(DocumentClient);

impl RemoteDocuments {
    pub fn new(client: DocumentClient) -> Self {
        Self(client)
    }

    fn client(&self) -> &DocumentClient {
        let Self(client) = self;
        client
    }
}

fn books_path(user: &User) -> String {
    format!("users/{}/{BOOKS_COLLECTION}", user.id)
}

fn book_path(user: &User, id: &BookId) -> String {
    format!("{}/{id}", books_path(user))
}

fn epoch_millis(instant: OffsetDateTime) -> i64 {
    (instant.unix_timestamp_nanos() / 1_000_000) as i64
}

fn rfc3339(instant: OffsetDateTime) -> Result<String> {
    instant
        .format(&Rfc3339)
        .map_err(|error| Error::Generic(format!("unformattable instant {error}")))
}

fn encode_info(info: &BookInfo) -> Result<Fields> {
    let BookInfo {
        title,
        author,
        cover_image,
        status,
        start_time,
        total_time,
        finished_at,
        // Local only
        total_readers: _,
    } = info;

    let mut fields = Fields::new();
    fields.insert(field::TITLE.to_owned(), Value::string(title));
    fields.insert(field::AUTHOR.to_owned(), Value::string(author));
    if let Some(cover_image) = cover_image {
        fields.insert(field::COVER_IMAGE.to_owned(), Value::string(cover_image));
    }
    encode_patch_into(
        &mut fields,
        &BookPatch {
            status: Some(*status),
            start_time: *start_time,
            total_time: *total_time,
            finished_at: *finished_at,
        },
    )?;
    Ok(fields)
}

/// Encodes the present fields and returns their names, for the update mask.
fn encode_patch_into(fields: &mut Fields, patch: &BookPatch) -> Result<Vec<&'static str>> {
    let mut mask = vec![];

    if let Some(status) = patch.status {
        fields.insert(field::STATUS.to_owned(), Value::string(status.name()));
        mask.push(field::STATUS);
    }
    if let Some(start_time) = patch.start_time {
        fields.insert(field::START_TIME.to_owned(), Value::integer(epoch_millis(start_time)));
        mask.push(field::START_TIME);
    }
    if let Some(total_time) = patch.total_time {
        let millis = i64::try_from(total_time.whole_milliseconds()).unwrap_or(i64::MAX);
        fields.insert(field::TOTAL_TIME.to_owned(), Value::integer(millis));
        mask.push(field::TOTAL_TIME);
    }
    if let Some(finished_at) = patch.finished_at {
        fields.insert(field::FINISHED_AT.to_owned(), Value::string(rfc3339(finished_at)?));
        mask.push(field::FINISHED_AT);
    }

    Ok(mask)
}

fn text<'a>(document: &'a wire::Document, name: &str) -> Result<&'a str> {
    document
        .fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedDocument(format!("{} has no {name}", document.name)))
}

fn optional_text(document: &wire::Document, name: &str) -> Option<String> {
    document
        .fields
        .get(name)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

// Instants were written both as epoch milliseconds and as RFC 3339 text
fn instant(document: &wire::Document, name: &str) -> Result<Option<OffsetDateTime>> {
    let Some(value) = document.fields.get(name).filter(|value| !value.is_null()) else {
        return Ok(None);
    };

    let malformed = || Error::MalformedDocument(format!("{} has a bad {name}", document.name));
    if let Some(millis) = value.as_i64() {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map(Some)
            .map_err(|_| malformed())
    } else if let Some(text) = value.as_str() {
        OffsetDateTime::parse(text, &Rfc3339)
            .map(Some)
            .map_err(|_| malformed())
    } else {
        Err(malformed())
    }
}

fn decode_book(document: &wire::Document) -> Result<Book> {
    let info = BookInfo {
        title: text(document, field::TITLE)?.to_owned(),
        author: text(document, field::AUTHOR)?.to_owned(),
        cover_image: optional_text(document, field::COVER_IMAGE),
        status: text(document, field::STATUS)?.parse()?,
        start_time: instant(document, field::START_TIME)?,
        total_time: document
            .fields
            .get(field::TOTAL_TIME)
            .and_then(Value::as_i64)
            .map(Duration::milliseconds),
        finished_at: instant(document, field::FINISHED_AT)?,
        total_readers: document
            .fields
            .get(field::TOTAL_READERS)
            .and_then(Value::as_i64)
            .and_then(|count| u64::try_from(count).ok()),
    };

    Ok(Book {
        id: BookId::from(document.id()),
        info,
    })
}

impl DocumentStore for RemoteDocuments {
    async fn fetch_books(&self, user: &User) -> Result<Vec<Book>> {
        let documents = self
            .client()
            .list_documents(&user.id_token, &books_path(user))
            .await?;

        Ok(documents
            .iter()
            .filter_map(|document| match decode_book(document) {
                Ok(book) => Some(book),
                Err(error) => {
                    warn!(%error, "skipping book document");
                    None
                }
            })
            .collect())
    }

    async fn add_book(&self, user: &User, id: Option<&BookId>, info: &BookInfo) -> Result<BookId> {
        let fields = encode_info(info)?;
        let document = self
            .client()
            .create_document(
                &user.id_token,
                &books_path(user),
                id.map(BookId::as_str),
                fields,
            )
            .await?;
        Ok(BookId::from(document.id()))
    }

    async fn update_book(&self, user: &User, id: &BookId, patch: &BookPatch) -> Result<()> {
        if patch.is_empty() {
            debug!(%id, "empty patch, nothing to send");
            return Ok(());
        }

        let mut fields = Fields::new();
        let mask = encode_patch_into(&mut fields, patch)?;

        self.client()
            .patch_document(&user.id_token, &book_path(user, id), fields, Some(mask.as_slice()), true)
            .await?;
        Ok(())
    }

    async fn remove_book(&self, user: &User, id: &BookId) -> Result<()> {
        Ok(self
            .client()
            .delete_document(&user.id_token, &book_path(user, id))
            .await?)
    }

    async fn count_readers(&self, user: &User, title: &str) -> Result<u64> {
        let query = wire::RunAggregationQueryRequest::count_where_equal(
            BOOKS_COLLECTION,
            READERS_ALIAS,
            vec![
                (field::TITLE, Value::string(title)),
                (field::STATUS, Value::string(crate::core::model::BookStatus::Reading.name())),
            ],
        );
        let count = self
            .client()
            .count(&user.id_token, &query, READERS_ALIAS)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn save_profile(&self, user: &User, profile: &UserProfile) -> Result<()> {
        let UserProfile {
            uid,
            name,
            email,
            created_at,
        } = profile;

        let mut fields = Fields::new();
        fields.insert(field::UID.to_owned(), Value::string(&uid.0));
        fields.insert(field::NAME.to_owned(), Value::string(name));
        fields.insert(field::EMAIL.to_owned(), Value::string(email));
        fields.insert(field::CREATED_AT.to_owned(), Value::string(rfc3339(*created_at)?));

        self.client()
            .patch_document(&user.id_token, &format!("users/{uid}"), fields, None, false)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RemoteIdentity(IdentityClient);

impl RemoteIdentity {
    pub fn new(client: IdentityClient) -> Self {
        Self(client)
    }

    fn client(&self) -> &IdentityClient {
        let Self(client) = self;
        client
    }
}

impl From<wire::AuthResponse> for User {
    fn from(
        wire::AuthResponse {
            local_id,
            email,
            id_token,
            refresh_token,
            display_name,
            expires_in,
        }: wire::AuthResponse,
    ) -> Self {
        Self {
            id: UserId(local_id),
            email,
            display_name: display_name.filter(|name| !name.is_empty()),
            id_token,
            refresh_token,
            expires_at: expiry(expires_in.as_deref(), OffsetDateTime::now_utc()),
        }
    }
}

/// The provider states token lifetimes as a count of seconds in a string.
fn expiry(expires_in: Option<&str>, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let seconds: i64 = expires_in?.trim().parse().ok()?;
    Some(now + Duration::seconds(seconds))
}

impl IdentityProvider for RemoteIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<User> {
        Ok(self.client().sign_up(email, password).await?.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        Ok(self.client().sign_in(email, password).await?.into())
    }

    async fn set_display_name(&self, user: &User, name: &str) -> Result<User> {
        let response = self
            .client()
            .update_display_name(&user.id_token, name)
            .await?;

        let rotated = response.id_token.is_some();
        Ok(User {
            display_name: response.display_name.or_else(|| Some(name.to_owned())),
            expires_at: if rotated {
                expiry(response.expires_in.as_deref(), OffsetDateTime::now_utc())
            } else {
                user.expires_at
            },
            id_token: response.id_token.unwrap_or_else(|| user.id_token.clone()),
            refresh_token: response
                .refresh_token
                .unwrap_or_else(|| user.refresh_token.clone()),
            ..user.clone()
        })
    }

    async fn sign_in_methods(&self, email: &str) -> Result<SignInMethods> {
        let wire::CreateAuthUriResponse {
            signin_methods,
            registered,
        } = self.client().sign_in_methods(email).await?;
        Ok(SignInMethods {
            methods: signin_methods,
            registered,
        })
    }

    async fn refresh(&self, user: &User) -> Result<User> {
        let wire::RefreshResponse {
            id_token,
            refresh_token,
            user_id,
            expires_in,
        } = self.client().refresh(&user.refresh_token).await?;
        let expires_at = expiry(expires_in.as_deref(), OffsetDateTime::now_utc());

        if user_id != user.id.0 {
            return Err(Error::Rejected(format!(
                "refreshed session belongs to {user_id}, not {}",
                user.id
            )));
        }

        // Pick up a display name changed elsewhere
        let account = self.client().lookup(&id_token).await?;
        Ok(User {
            display_name: account
                .and_then(|account| account.display_name)
                .or_else(|| user.display_name.clone()),
            id_token,
            refresh_token,
            expires_at,
            ..user.clone()
        })
    }
}

#[derive(Clone)]
pub struct RemoteCatalog(CatalogClient);

impl RemoteCatalog {
    pub fn new(client: CatalogClient) -> Self {
        Self(client)
    }
}

impl BookCatalog for RemoteCatalog {
    async fn search(&self, query_text: &str) -> Result<Vec<Candidate>> {
        let Self(client) = self;
        Ok(client
            .search(query_text)
            .await?
            .into_iter()
            .map(Candidate::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{BookStatus, InitialStatus};
    use time::macros::datetime;

    fn document(fields: Fields) -> wire::Document {
        wire::Document {
            name: "projects/p/databases/(default)/documents/users/u1/books/b1".to_owned(),
            fields,
            create_time: None,
            update_time: None,
        }
    }

    #[test]
    fn books_survive_the_wire() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let mut info = BookInfo::new(
            "Dune",
            "Frank Herbert",
            Some("http://cover".to_owned()),
            InitialStatus::Reading,
            now,
        )
        .expect("a valid book");
        info.finish_reading(&BookId::from("b1"), now + Duration::hours(3))
            .expect("reading → finished")
            .apply(&mut info);

        let decoded = decode_book(&document(encode_info(&info).expect("encodable")))
            .expect("decodable");
        assert_eq!(decoded.id, BookId::from("b1"));
        assert_eq!(decoded.info, info);
    }

    #[test]
    fn documents_from_the_browser_client_decode() {
        let mut fields = Fields::new();
        fields.insert("title".to_owned(), Value::string("Emma"));
        fields.insert("author".to_owned(), Value::string("Jane Austen"));
        fields.insert("coverImage".to_owned(), Value::string(""));
        fields.insert("status".to_owned(), Value::string("finished"));
        fields.insert("startTime".to_owned(), Value::DoubleValue(1_714_564_800_000.0));
        fields.insert("totalTime".to_owned(), Value::integer(90_000));
        fields.insert(
            "finishedAt".to_owned(),
            Value::string("2024-05-01T12:01:30.000Z"),
        );

        let book = decode_book(&document(fields)).expect("decodable");
        assert_eq!(book.info.status, BookStatus::Finished);
        assert_eq!(book.info.cover_image, None);
        assert_eq!(book.info.start_time, Some(datetime!(2024-05-01 12:00 UTC)));
        assert_eq!(book.info.total_time, Some(Duration::seconds(90)));
        assert_eq!(book.info.finished_at, Some(datetime!(2024-05-01 12:01:30 UTC)));
    }

    #[test]
    fn unknown_statuses_are_rejected() {
        let mut fields = Fields::new();
        fields.insert("title".to_owned(), Value::string("Emma"));
        fields.insert("author".to_owned(), Value::string("Jane Austen"));
        fields.insert("status".to_owned(), Value::string("abandoned"));

        assert!(matches!(
            decode_book(&document(fields)),
            Err(Error::MalformedDocument(..))
        ));
    }

    #[test]
    fn patches_name_only_their_fields() {
        let mut fields = Fields::new();
        let mask = encode_patch_into(
            &mut fields,
            &BookPatch {
                status: Some(BookStatus::Reading),
                start_time: Some(datetime!(2024-05-01 12:00 UTC)),
                ..Default::default()
            },
        )
        .expect("encodable");

        assert_eq!(mask, [field::STATUS, field::START_TIME]);
        assert_eq!(fields[field::START_TIME], Value::integer(1_714_564_800_000));
        assert!(BookPatch::default().is_empty());
    }

    #[test]
    fn token_expiry_counts_from_now() {
        let now = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(expiry(Some("3600"), now), Some(datetime!(2024-05-01 13:00 UTC)));
        assert_eq!(expiry(Some("soon"), now), None);
        assert_eq!(expiry(None, now), None);
    }
}
