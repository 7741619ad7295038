//! XML documents for success and error responses.
//!
//! Element names follow the catalog field names: `<Bucket>` with
//! `Name`/`CreationTime`/`LastModifiedTime`/`Status`, a
//! `<ListAllBucketsResponse>` wrapping several of those, `<Object>` with
//! `Key`/`Size`/`LastModified`/`ContentType`, and `<Error>` with
//! `Code`/`Message`/`Resource`.

use crate::models::{bucket::Bucket, object::Object};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesText, Event},
};
use std::io::{self, Write};

/// Content type of every document produced here.
pub const XML_CONTENT_TYPE: &str = "application/xml";

pub fn bucket_document(bucket: &Bucket) -> Vec<u8> {
    render(|w| write_bucket(w, bucket))
}

pub fn bucket_list_document(buckets: &[Bucket]) -> Vec<u8> {
    render(|w| {
        w.create_element("ListAllBucketsResponse")
            .write_inner_content(|w| {
                for bucket in buckets {
                    write_bucket(w, bucket)?;
                }
                Ok(())
            })?;
        Ok(())
    })
}

pub fn object_document(object: &Object) -> Vec<u8> {
    render(|w| {
        w.create_element("Object").write_inner_content(|w| {
            write_text_element(w, "Key", &object.key)?;
            write_text_element(w, "Size", &object.size.to_string())?;
            write_text_element(w, "LastModified", &timestamp(&object.last_modified))?;
            write_text_element(w, "ContentType", &object.content_type)
        })?;
        Ok(())
    })
}

pub fn error_document(code: &str, message: &str, resource: Option<&str>) -> Vec<u8> {
    render(|w| {
        w.create_element("Error").write_inner_content(|w| {
            write_text_element(w, "Code", code)?;
            write_text_element(w, "Message", message)?;
            if let Some(resource) = resource {
                write_text_element(w, "Resource", resource)?;
            }
            Ok(())
        })?;
        Ok(())
    })
}

fn render<F>(body: F) -> Vec<u8>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(256);
    let result = {
        let mut writer = Writer::new(&mut buf);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .and_then(|()| body(&mut writer))
    };
    // Writing into a Vec cannot fail short of a logic error.
    if let Err(err) = result {
        tracing::error!("failed to serialize XML document: {}", err);
        buf.clear();
    }
    buf
}

fn write_bucket<W: Write>(writer: &mut Writer<W>, bucket: &Bucket) -> io::Result<()> {
    writer.create_element("Bucket").write_inner_content(|w| {
        write_text_element(w, "Name", &bucket.name)?;
        write_text_element(w, "CreationTime", &timestamp(&bucket.creation_time))?;
        write_text_element(w, "LastModifiedTime", &timestamp(&bucket.last_modified_time))?;
        write_text_element(w, "Status", bucket.status.as_str())
    })?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
